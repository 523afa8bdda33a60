//! Encoder for the iden3 R1CS container, the inverse of [`super::reader`].
use super::reader::{SectionKind, R1CS_MAGIC, R1CS_VERSION};
use super::{LinearCombination, R1csDocument};

/// Encodes a document as a version 1 container with a header, a constraints section and a
/// sequential wire label section.
pub fn encode(doc: &R1csDocument) -> Vec<u8> {
    encode_container(&[
        (SectionKind::Header.section_type(), encode_header(doc)),
        (
            SectionKind::Constraints.section_type(),
            encode_constraints(doc),
        ),
        (
            SectionKind::WireLabels.section_type(),
            encode_wire_labels(doc),
        ),
    ])
}

/// Frames raw section payloads. Sections are written in the given order.
pub fn encode_container(sections: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(R1CS_MAGIC.to_le_bytes());
    bytes.extend(R1CS_VERSION.to_le_bytes());
    bytes.extend((sections.len() as u32).to_le_bytes());
    for (section_type, payload) in sections {
        bytes.extend(section_type.to_le_bytes());
        bytes.extend((payload.len() as i64).to_le_bytes());
        bytes.extend(payload);
    }
    bytes
}

pub fn encode_header(doc: &R1csDocument) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(doc.field_size.to_le_bytes());
    write_field_bytes(&mut bytes, &doc.prime.to_bytes_le(), doc.field_size);
    for count in [
        doc.n_wires,
        doc.n_outputs,
        doc.n_pub_inputs,
        doc.n_prv_inputs,
    ] {
        bytes.extend(count.to_le_bytes());
    }
    bytes.extend(doc.n_labels.to_le_bytes());
    bytes.extend((doc.constraints.len() as u32).to_le_bytes());
    bytes
}

pub fn encode_constraints(doc: &R1csDocument) -> Vec<u8> {
    let mut bytes = Vec::new();
    for constraint in &doc.constraints {
        for lc in constraint.linear_combinations() {
            write_linear_combination(&mut bytes, lc, doc.field_size);
        }
    }
    bytes
}

/// One `u64` label per wire, equal to the wire index.
pub fn encode_wire_labels(doc: &R1csDocument) -> Vec<u8> {
    (0..doc.n_wires as u64).flat_map(u64::to_le_bytes).collect()
}

fn write_linear_combination(bytes: &mut Vec<u8>, lc: &LinearCombination, field_size: u32) {
    bytes.extend((lc.len() as u32).to_le_bytes());
    for (wire, coef) in lc.terms() {
        bytes.extend((wire as u32).to_le_bytes());
        write_field_bytes(bytes, &coef.value().to_bytes_le(), field_size);
    }
}

/// Writes `value` zero padded to exactly `field_size` bytes. Longer values are cut, which
/// only happens for documents that are invalid to begin with.
fn write_field_bytes(bytes: &mut Vec<u8>, value: &[u8], field_size: u32) {
    let field_size = field_size as usize;
    let mut padded = vec![0; field_size];
    let len = value.len().min(field_size);
    padded[..len].copy_from_slice(&value[..len]);
    bytes.extend(padded);
}

#[cfg(test)]
mod tests {
    use super::{encode, encode_wire_labels};
    use crate::core::fields::PrimeField;
    use crate::test_utils::{product_chain, scenario_eq_constant};

    #[test]
    fn test_encode_layout() {
        let doc = scenario_eq_constant(&PrimeField::goldilocks(), 12);
        let bytes = encode(&doc);

        assert_eq!(&bytes[..4], b"r1cs");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_le_bytes());
        // Header payload: field size, prime, 4 counts, labels, constraint count.
        assert_eq!(&bytes[12..16], &1u32.to_le_bytes());
        assert_eq!(&bytes[16..24], &(4i64 + 8 + 16 + 8 + 4).to_le_bytes());
        assert_eq!(&bytes[24..28], &8u32.to_le_bytes());
        assert_eq!(&bytes[28..36], &18446744069414584321u64.to_le_bytes());
    }

    #[test]
    fn test_coefficients_padded_to_field_size() {
        let doc = product_chain(&PrimeField::bn254(), 2);
        let bytes = encode(&doc);
        // Header: 12 bytes framing, 4 + 32 + 16 + 8 + 4 payload. Then the constraints
        // section framing, then the first term count and wire.
        let first_coef = 12 + 12 + 64 + 12 + 4 + 4;

        let mut expected = [0u8; 32];
        expected[0] = 1;
        assert_eq!(&bytes[first_coef..first_coef + 32], &expected);
    }

    #[test]
    fn test_wire_labels_sequential() {
        let doc = scenario_eq_constant(&PrimeField::goldilocks(), 12);
        let labels = encode_wire_labels(&doc);
        assert_eq!(labels.len(), 16);
        assert_eq!(&labels[8..], &1u64.to_le_bytes());
    }
}
