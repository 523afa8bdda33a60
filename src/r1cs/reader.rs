use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::One;
use thiserror::Error;
use tracing::{instrument, warn};

use super::{Constraint, LinearCombination, R1csDocument};
use crate::core::fields::PrimeField;

/// `"r1cs"` read as a little-endian `u32`.
pub const R1CS_MAGIC: u32 = 0x7363_3172;
pub const R1CS_VERSION: u32 = 1;

const FILE_HEADER_LEN: usize = 12;
const SECTION_HEADER_LEN: usize = 12;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unexpected end of data at offset {offset}: {needed} more bytes needed.")]
    Truncated { offset: usize, needed: usize },
    #[error("Bad magic value {found:#010x}.")]
    BadMagic { found: u32 },
    #[error("Section of type {section_type} has negative length {length}.")]
    NegativeSectionLength { section_type: u32, length: i64 },
    #[error("Section {0:?} appears more than once.")]
    DuplicateSection(SectionKind),
    #[error("Required section {0:?} is missing.")]
    MissingSection(SectionKind),
    #[error("Invalid field: size {field_size} bytes, prime {prime}.")]
    InvalidPrime { field_size: u32, prime: BigUint },
    #[error("Header declares {declared} wires but layout needs at least {required}.")]
    InconsistentHeader { declared: u64, required: u64 },
    #[error("Constraint {constraint} references wire {wire}, but there are {n_wires} wires.")]
    WireOutOfRange {
        constraint: usize,
        wire: u32,
        n_wires: u32,
    },
    #[error("Constraint {constraint} has a coefficient for wire {wire} that is not reduced.")]
    NonCanonicalCoefficient { constraint: usize, wire: u32 },
    #[error("Constraint {constraint} repeats wire {wire} within one linear combination.")]
    DuplicateWire { constraint: usize, wire: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UnsupportedFeatureError {
    #[error("Custom gates (section type {section_type}) are not supported.")]
    CustomGates { section_type: u32 },
    #[error("Container version {0} is not supported.")]
    Version(u32),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeatureError),
}

/// The closed set of section kinds a container can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionKind {
    Header,
    Constraints,
    /// Wire id to label map. Labels always equal the wire index, so it is never decoded.
    WireLabels,
    CustomGates(u32),
    Unknown(u32),
}

impl SectionKind {
    pub const fn section_type(&self) -> u32 {
        match self {
            SectionKind::Header => 1,
            SectionKind::Constraints => 2,
            SectionKind::WireLabels => 3,
            SectionKind::CustomGates(t) | SectionKind::Unknown(t) => *t,
        }
    }
}

impl From<u32> for SectionKind {
    fn from(section_type: u32) -> Self {
        match section_type {
            1 => SectionKind::Header,
            2 => SectionKind::Constraints,
            3 => SectionKind::WireLabels,
            4 | 5 => SectionKind::CustomGates(section_type),
            t => SectionKind::Unknown(t),
        }
    }
}

/// Counts and prime from the header section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R1csHeader {
    pub field_size: u32,
    pub prime: BigUint,
    pub n_wires: u32,
    pub n_outputs: u32,
    pub n_pub_inputs: u32,
    pub n_prv_inputs: u32,
    pub n_labels: i64,
    pub n_constraints: u32,
}

#[derive(Clone, Debug)]
struct Section {
    kind: SectionKind,
    offset: usize,
    length: usize,
    parsed: bool,
}

/// Little-endian cursor over a byte slice. Offsets in errors are absolute.
struct ByteReader<'a> {
    bytes: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8], base: usize) -> Self {
        Self {
            bytes,
            base,
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < len {
            return Err(FormatError::Truncated {
                offset: self.base + self.pos,
                needed: len - self.remaining(),
            });
        }
        let res = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(res)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut res = [0; N];
        res.copy_from_slice(self.read_bytes(N)?);
        Ok(res)
    }

    fn read_u32(&mut self) -> Result<u32, FormatError> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_i64(&mut self) -> Result<i64, FormatError> {
        self.read_array().map(i64::from_le_bytes)
    }

    fn read_biguint(&mut self, len: usize) -> Result<BigUint, FormatError> {
        self.read_bytes(len).map(BigUint::from_bytes_le)
    }
}

/// Reader for the iden3 R1CS binary container.
///
/// Construction reads the file header and indexes every section. Sections are then decoded on
/// demand, and each one at most once.
pub struct R1csReader<'a> {
    bytes: &'a [u8],
    version: u32,
    sections: BTreeMap<u32, Section>,
    header: Option<R1csHeader>,
    constraints: Option<Vec<Constraint>>,
}

impl<'a> R1csReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(bytes, 0);
        let magic = reader.read_u32()?;
        if magic != R1CS_MAGIC {
            return Err(FormatError::BadMagic { found: magic }.into());
        }
        let version = reader.read_u32()?;
        if version != R1CS_VERSION {
            return Err(UnsupportedFeatureError::Version(version).into());
        }
        let section_count = reader.read_u32()?;

        let mut sections = BTreeMap::new();
        let mut offset = FILE_HEADER_LEN;
        for _ in 0..section_count {
            let mut section_reader = ByteReader::new(&bytes[offset..], offset);
            let section_type = section_reader.read_u32()?;
            let length = section_reader.read_i64()?;
            let kind = SectionKind::from(section_type);
            offset += SECTION_HEADER_LEN;
            let length = usize::try_from(length).map_err(|_| {
                FormatError::NegativeSectionLength {
                    section_type,
                    length,
                }
            })?;
            if bytes.len() - offset < length {
                return Err(FormatError::Truncated {
                    offset: bytes.len(),
                    needed: length - (bytes.len() - offset),
                }
                .into());
            }
            if let SectionKind::CustomGates(section_type) = kind {
                return Err(UnsupportedFeatureError::CustomGates { section_type }.into());
            }
            if sections.contains_key(&section_type) {
                if matches!(kind, SectionKind::Header | SectionKind::Constraints) {
                    return Err(FormatError::DuplicateSection(kind).into());
                }
                warn!(section_type, "Ignoring repeated section.");
            } else {
                sections.insert(
                    section_type,
                    Section {
                        kind,
                        offset,
                        length,
                        parsed: false,
                    },
                );
            }
            offset += length;
        }

        Ok(Self {
            bytes,
            version,
            sections,
            header: None,
            constraints: None,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Kinds of the indexed sections, in section-type order.
    pub fn section_kinds(&self) -> impl Iterator<Item = SectionKind> + '_ {
        self.sections.values().map(|section| section.kind)
    }

    pub fn header(&mut self) -> Result<&R1csHeader, ParseError> {
        self.decode_section(SectionKind::Header)?;
        self.header
            .as_ref()
            .ok_or_else(|| FormatError::MissingSection(SectionKind::Header).into())
    }

    /// Decodes a section unless it was decoded before. Sections that carry nothing needed
    /// are only marked parsed.
    fn decode_section(&mut self, kind: SectionKind) -> Result<(), ParseError> {
        let Some(section) = self.sections.get(&kind.section_type()) else {
            return match kind {
                SectionKind::Header => Err(FormatError::MissingSection(kind).into()),
                _ => Ok(()),
            };
        };
        if section.parsed {
            return Ok(());
        }
        let (offset, length) = (section.offset, section.length);
        match kind {
            SectionKind::Header => {
                self.header = Some(self.decode_header(offset, length)?);
            }
            SectionKind::Constraints => {
                self.decode_section(SectionKind::Header)?;
                self.constraints = Some(self.decode_constraints(offset, length)?);
            }
            SectionKind::WireLabels | SectionKind::Unknown(_) => {}
            SectionKind::CustomGates(section_type) => {
                return Err(UnsupportedFeatureError::CustomGates { section_type }.into());
            }
        }
        if let Some(section) = self.sections.get_mut(&kind.section_type()) {
            section.parsed = true;
        }
        Ok(())
    }

    fn section_reader(&self, offset: usize, length: usize) -> ByteReader<'a> {
        ByteReader::new(&self.bytes[offset..offset + length], offset)
    }

    fn decode_header(&self, offset: usize, length: usize) -> Result<R1csHeader, FormatError> {
        let mut reader = self.section_reader(offset, length);
        let field_size = reader.read_u32()?;
        let prime = reader.read_biguint(field_size as usize)?;
        if field_size == 0 || prime <= BigUint::one() {
            return Err(FormatError::InvalidPrime { field_size, prime });
        }
        let header = R1csHeader {
            field_size,
            prime,
            n_wires: reader.read_u32()?,
            n_outputs: reader.read_u32()?,
            n_pub_inputs: reader.read_u32()?,
            n_prv_inputs: reader.read_u32()?,
            n_labels: reader.read_i64()?,
            n_constraints: reader.read_u32()?,
        };
        let required = 1
            + header.n_outputs as u64
            + header.n_pub_inputs as u64
            + header.n_prv_inputs as u64;
        if required > header.n_wires as u64 {
            return Err(FormatError::InconsistentHeader {
                declared: header.n_wires as u64,
                required,
            });
        }
        Ok(header)
    }

    fn decode_constraints(
        &self,
        offset: usize,
        length: usize,
    ) -> Result<Vec<Constraint>, ParseError> {
        let header = self
            .header
            .as_ref()
            .ok_or(FormatError::MissingSection(SectionKind::Header))?;
        let field = PrimeField::new(header.prime.clone());
        let mut reader = self.section_reader(offset, length);

        let mut read_lc = |constraint: usize| -> Result<LinearCombination, FormatError> {
            let n_terms = reader.read_u32()?;
            let mut lc = LinearCombination::new();
            for _ in 0..n_terms {
                let wire = reader.read_u32()?;
                let coef = reader.read_biguint(header.field_size as usize)?;
                if wire >= header.n_wires {
                    return Err(FormatError::WireOutOfRange {
                        constraint,
                        wire,
                        n_wires: header.n_wires,
                    });
                }
                if !field.is_canonical(&coef) {
                    return Err(FormatError::NonCanonicalCoefficient { constraint, wire });
                }
                if lc.insert(wire as usize, field.reduce(coef)).is_some() {
                    return Err(FormatError::DuplicateWire { constraint, wire });
                }
            }
            Ok(lc)
        };

        let mut constraints = Vec::new();
        for i in 0..header.n_constraints as usize {
            let a = read_lc(i)?;
            let b = read_lc(i)?;
            let c = read_lc(i)?;
            constraints.push(Constraint::new(a, b, c));
        }
        if reader.remaining() > 0 {
            warn!(
                trailing = reader.remaining(),
                "Constraints section has trailing bytes."
            );
        }
        Ok(constraints)
    }

    /// Decodes whatever is still needed and assembles the document.
    pub fn into_document(mut self) -> Result<R1csDocument, ParseError> {
        let kinds = self.section_kinds().collect::<Vec<_>>();
        self.decode_section(SectionKind::Header)?;
        for kind in kinds {
            self.decode_section(kind)?;
        }
        let header = self
            .header
            .take()
            .ok_or(FormatError::MissingSection(SectionKind::Header))?;
        let constraints = match self.constraints.take() {
            Some(constraints) => constraints,
            None if header.n_constraints == 0 => Vec::new(),
            None => return Err(FormatError::MissingSection(SectionKind::Constraints).into()),
        };
        Ok(R1csDocument {
            field_size: header.field_size,
            prime: header.prime,
            n_wires: header.n_wires,
            n_outputs: header.n_outputs,
            n_pub_inputs: header.n_pub_inputs,
            n_prv_inputs: header.n_prv_inputs,
            n_labels: header.n_labels,
            constraints,
        })
    }
}

#[instrument(skip_all, fields(len = bytes.len()))]
pub fn parse(bytes: &[u8]) -> Result<R1csDocument, ParseError> {
    R1csReader::new(bytes)?.into_document()
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::{
        parse, FormatError, ParseError, R1csReader, SectionKind, UnsupportedFeatureError,
        R1CS_MAGIC,
    };
    use crate::core::fields::{PrimeField, GOLDILOCKS_PRIME};
    use crate::r1cs::writer::{encode, encode_constraints, encode_container, encode_header};
    use crate::test_utils::{product_chain, scenario_eq_constant};

    #[test]
    fn test_parse_round_trip() {
        let field = PrimeField::bn254();
        let doc = product_chain(&field, 5);

        let parsed = parse(&encode(&doc)).unwrap();

        assert_eq!(parsed.n_vars(), 8);
        assert_eq!(parsed.n_outputs, 1);
        assert_eq!(parsed.n_pub_inputs, 1);
        assert_eq!(parsed.n_prv_inputs, 1);
        assert_eq!(parsed.n_constraints(), 5);
        assert_eq!(&parsed.prime, field.modulus());
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_parse_hand_assembled_bytes() {
        // Goldilocks prime, 2 wires, 1 public input, one constraint: 1·x1 * 1 = 12.
        let mut bytes = Vec::new();
        bytes.extend(R1CS_MAGIC.to_le_bytes());
        bytes.extend(1u32.to_le_bytes());
        bytes.extend(2u32.to_le_bytes());

        let mut header = Vec::new();
        header.extend(8u32.to_le_bytes());
        header.extend(18446744069414584321u64.to_le_bytes());
        for count in [2u32, 0, 1, 0] {
            header.extend(count.to_le_bytes());
        }
        header.extend(2i64.to_le_bytes());
        header.extend(1u32.to_le_bytes());

        let mut constraints = Vec::new();
        for (wire, value) in [(1u32, 1u64), (0, 1), (0, 12)] {
            constraints.extend(1u32.to_le_bytes());
            constraints.extend(wire.to_le_bytes());
            constraints.extend(value.to_le_bytes());
        }

        // Constraints before the header, as some writers emit them.
        for (section_type, payload) in [(2u32, constraints), (1, header)] {
            bytes.extend(section_type.to_le_bytes());
            bytes.extend((payload.len() as i64).to_le_bytes());
            bytes.extend(payload);
        }

        let doc = parse(&bytes).unwrap();
        let field = PrimeField::goldilocks();

        assert_eq!(doc, scenario_eq_constant(&field, 12));
        assert_eq!(doc.field_size, 8);
        assert_eq!(doc.n_labels, 2);
    }

    #[test]
    fn test_custom_gates_rejected_before_constraints() {
        let doc = product_chain(&PrimeField::goldilocks(), 2);
        // The constraints payload is garbage: a lazy reader must fail on the custom gate
        // section before it ever looks at it.
        let bytes = encode_container(&[
            (1, encode_header(&doc)),
            (2, vec![0xff; 3]),
            (4, vec![]),
        ]);

        assert_eq!(
            parse(&bytes),
            Err(ParseError::Unsupported(UnsupportedFeatureError::CustomGates {
                section_type: 4
            }))
        );
    }

    #[test]
    fn test_unknown_sections_skipped() {
        let doc = product_chain(&PrimeField::goldilocks(), 2);
        let bytes = encode_container(&[
            (1, encode_header(&doc)),
            (9, vec![1, 2, 3]),
            (2, encode_constraints(&doc)),
        ]);

        let mut reader = R1csReader::new(&bytes).unwrap();
        assert_eq!(
            reader.section_kinds().collect::<Vec<_>>(),
            vec![
                SectionKind::Header,
                SectionKind::Constraints,
                SectionKind::Unknown(9)
            ]
        );
        assert_eq!(reader.header().unwrap().n_constraints, 2);
        assert_eq!(reader.into_document().unwrap(), doc);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&product_chain(&PrimeField::goldilocks(), 2));
        bytes[0] ^= 1;
        assert!(matches!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::BadMagic { .. }))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(&product_chain(&PrimeField::goldilocks(), 2));
        bytes[4] = 2;
        assert_eq!(
            parse(&bytes),
            Err(ParseError::Unsupported(UnsupportedFeatureError::Version(2)))
        );
    }

    #[test]
    fn test_truncated() {
        let bytes = encode(&product_chain(&PrimeField::goldilocks(), 2));
        for len in [0, 5, 13, bytes.len() - 1] {
            assert!(
                matches!(
                    parse(&bytes[..len]),
                    Err(ParseError::Format(FormatError::Truncated { .. }))
                ),
                "len {len}"
            );
        }
    }

    #[test]
    fn test_negative_section_length() {
        let mut bytes = encode(&product_chain(&PrimeField::goldilocks(), 2));
        bytes[16..24].copy_from_slice(&(-1i64).to_le_bytes());
        assert_eq!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::NegativeSectionLength {
                section_type: 1,
                length: -1
            }))
        );
    }

    #[test]
    fn test_duplicate_header() {
        let doc = product_chain(&PrimeField::goldilocks(), 2);
        let bytes = encode_container(&[
            (1, encode_header(&doc)),
            (1, encode_header(&doc)),
            (2, encode_constraints(&doc)),
        ]);
        assert_eq!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::DuplicateSection(
                SectionKind::Header
            )))
        );
    }

    #[test]
    fn test_missing_sections() {
        let doc = product_chain(&PrimeField::goldilocks(), 2);
        assert_eq!(
            parse(&encode_container(&[(2, encode_constraints(&doc))])),
            Err(ParseError::Format(FormatError::MissingSection(
                SectionKind::Header
            )))
        );
        assert_eq!(
            parse(&encode_container(&[(1, encode_header(&doc))])),
            Err(ParseError::Format(FormatError::MissingSection(
                SectionKind::Constraints
            )))
        );
    }

    #[test]
    fn test_duplicate_wire_rejected() {
        let field = PrimeField::goldilocks();
        let doc = scenario_eq_constant(&field, 12);
        let mut constraints = Vec::new();
        // A = 1·x1 + 2·x1.
        constraints.extend(2u32.to_le_bytes());
        for coef in [1u64, 2] {
            constraints.extend(1u32.to_le_bytes());
            constraints.extend(coef.to_le_bytes());
        }
        for (wire, coef) in [(0u32, 1u64), (0, 12)] {
            constraints.extend(1u32.to_le_bytes());
            constraints.extend(wire.to_le_bytes());
            constraints.extend(coef.to_le_bytes());
        }
        let bytes = encode_container(&[(1, encode_header(&doc)), (2, constraints)]);

        assert_eq!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::DuplicateWire {
                constraint: 0,
                wire: 1
            }))
        );
    }

    #[test]
    fn test_non_canonical_coefficient_rejected() {
        let field = PrimeField::goldilocks();
        let doc = scenario_eq_constant(&field, 12);
        let mut constraints = Vec::new();
        // A = p·x1, which reduces to zero but is not canonical.
        for (wire, coef) in [(1u32, GOLDILOCKS_PRIME), (0, 1), (0, 12)] {
            constraints.extend(1u32.to_le_bytes());
            constraints.extend(wire.to_le_bytes());
            constraints.extend(coef.to_le_bytes());
        }
        let bytes = encode_container(&[(1, encode_header(&doc)), (2, constraints)]);

        assert_eq!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::NonCanonicalCoefficient {
                constraint: 0,
                wire: 1
            }))
        );
    }

    #[test_log::test]
    fn test_trailing_constraint_bytes_tolerated() {
        let doc = product_chain(&PrimeField::goldilocks(), 3);
        let mut constraints = encode_constraints(&doc);
        constraints.extend([0xab; 5]);
        let bytes = encode_container(&[(1, encode_header(&doc)), (2, constraints)]);

        assert_eq!(parse(&bytes), Ok(doc));
    }

    #[test]
    fn test_custom_gate_applications_rejected() {
        let doc = product_chain(&PrimeField::goldilocks(), 2);
        let bytes = encode_container(&[
            (1, encode_header(&doc)),
            (2, encode_constraints(&doc)),
            (5, vec![0; 4]),
        ]);

        assert_eq!(
            parse(&bytes),
            Err(ParseError::Unsupported(UnsupportedFeatureError::CustomGates {
                section_type: 5
            }))
        );
    }

    #[test]
    fn test_wire_out_of_range() {
        let field = PrimeField::goldilocks();
        let mut doc = scenario_eq_constant(&field, 12);
        doc.constraints[0].a = crate::test_utils::lc(&field, &[(7, 1)]);
        assert_eq!(
            parse(&encode(&doc)),
            Err(ParseError::Format(FormatError::WireOutOfRange {
                constraint: 0,
                wire: 7,
                n_wires: 2
            }))
        );
    }

    #[test]
    fn test_inconsistent_header() {
        let field = PrimeField::goldilocks();
        let mut doc = scenario_eq_constant(&field, 12);
        doc.n_prv_inputs = 3;
        assert_eq!(
            parse(&encode(&doc)),
            Err(ParseError::Format(FormatError::InconsistentHeader {
                declared: 2,
                required: 5
            }))
        );
    }

    #[test]
    fn test_invalid_prime() {
        let field = PrimeField::goldilocks();
        let mut doc = scenario_eq_constant(&field, 12);
        doc.prime = BigUint::from(1u32);
        doc.constraints.clear();
        doc.n_wires = 2;
        let bytes = encode_container(&[(1, encode_header(&doc))]);
        assert!(matches!(
            parse(&bytes),
            Err(ParseError::Format(FormatError::InvalidPrime { .. }))
        ));
    }
}
