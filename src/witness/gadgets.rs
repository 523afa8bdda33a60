//! Fast paths that fill groups of wires the generic elimination cannot resolve.
use std::fmt::Debug;

use num_bigint::BigUint;
use thiserror::Error;

use crate::core::fields::{FieldElement, PrimeField};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GadgetError {
    #[error("Value {value} does not fit in {n_bits} bits.")]
    ValueTooLarge { value: BigUint, n_bits: usize },
    #[error("Wire {wire} is out of range for {n_wires} wires.")]
    WireOutOfRange { wire: usize, n_wires: usize },
}

/// A solver fast path.
///
/// `apply` is called at the start of every solver round with the current partial assignment.
/// It fills what it can and returns how many wires it filled; zero means it did not apply.
pub trait Gadget: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        field: &PrimeField,
        values: &mut [Option<FieldElement>],
    ) -> Result<usize, GadgetError>;
}

/// Splits `source` into `n_bits` boolean wires starting at `bits_start`, least significant
/// bit first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitDecomposition {
    pub source: usize,
    pub bits_start: usize,
    pub n_bits: usize,
}

impl BitDecomposition {
    pub fn new(source: usize, bits_start: usize, n_bits: usize) -> Self {
        Self {
            source,
            bits_start,
            n_bits,
        }
    }
}

impl Gadget for BitDecomposition {
    fn name(&self) -> &str {
        "bit_decomposition"
    }

    fn apply(
        &self,
        field: &PrimeField,
        values: &mut [Option<FieldElement>],
    ) -> Result<usize, GadgetError> {
        let n_wires = values.len();
        for wire in [self.source, self.bits_start + self.n_bits.saturating_sub(1)] {
            if wire >= n_wires {
                return Err(GadgetError::WireOutOfRange { wire, n_wires });
            }
        }
        let bits = self.bits_start..self.bits_start + self.n_bits;
        let Some(source) = &values[self.source] else {
            return Ok(0);
        };
        // Only fires when every bit is unknown; partial states are left to elimination.
        if values[bits.clone()].iter().any(Option::is_some) {
            return Ok(0);
        }
        let value = source.value().clone();
        if value.bits() > self.n_bits as u64 {
            return Err(GadgetError::ValueTooLarge {
                value,
                n_bits: self.n_bits,
            });
        }
        for (i, wire) in bits.enumerate() {
            let bit = if value.bit(i as u64) {
                field.one()
            } else {
                field.zero()
            };
            values[wire] = Some(bit);
        }
        Ok(self.n_bits)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::{BitDecomposition, Gadget, GadgetError};
    use crate::core::fields::PrimeField;

    #[test]
    fn test_bit_decomposition_lsb_first() {
        let field = PrimeField::goldilocks();
        let gadget = BitDecomposition::new(0, 1, 4);
        let mut values = vec![Some(field.from_u64(0b0110)), None, None, None, None];

        assert_eq!(gadget.apply(&field, &mut values), Ok(4));
        assert_eq!(
            values,
            [0b0110, 0, 1, 1, 0]
                .map(|v| Some(field.from_u64(v)))
                .to_vec()
        );
        // Already filled.
        assert_eq!(gadget.apply(&field, &mut values), Ok(0));
    }

    #[test]
    fn test_bit_decomposition_waits_for_source() {
        let field = PrimeField::goldilocks();
        let mut values = vec![None; 3];
        assert_eq!(BitDecomposition::new(0, 1, 2).apply(&field, &mut values), Ok(0));
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn test_bit_decomposition_overflow() {
        let field = PrimeField::goldilocks();
        let mut values = vec![Some(field.from_u64(4)), None, None];
        assert_eq!(
            BitDecomposition::new(0, 1, 2).apply(&field, &mut values),
            Err(GadgetError::ValueTooLarge {
                value: BigUint::from(4u32),
                n_bits: 2
            })
        );
    }

    #[test]
    fn test_bit_decomposition_out_of_range() {
        let field = PrimeField::goldilocks();
        let mut values = vec![None; 3];
        assert_eq!(
            BitDecomposition::new(0, 1, 3).apply(&field, &mut values),
            Err(GadgetError::WireOutOfRange {
                wire: 3,
                n_wires: 3
            })
        );
    }
}
