use std::fmt::{self, Display};
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 2 ** 64 - 2 ** 32 + 1
pub const GOLDILOCKS_PRIME: u64 = 18446744069414584321;

/// Scalar field of BN254, the default circom prime. Little-endian `u32` digits.
pub const BN254_PRIME_DIGITS: [u32; 8] = [
    0xf0000001, 0x43e1f593, 0x79b97091, 0x2833e848, 0x8181585d, 0xb85045b6, 0xe131a029,
    0x30644e72,
];

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("Division by zero.")]
    DivisionByZero,
}

/// A canonical representative in `[0, p)`.
///
/// Elements do not carry their modulus. All arithmetic goes through the [`PrimeField`] they
/// were produced by.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FieldElement(BigUint);

impl FieldElement {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    pub fn into_value(self) -> BigUint {
        self.0
    }

    /// Splits the value into little-endian limbs of `bits` bits each. Zero is the empty
    /// sequence.
    pub fn to_limbs(&self, bits: u32) -> Vec<u64> {
        value_to_limbs(&self.0, bits)
    }
}

/// Little-endian limbs of `bits` bits each, without any reduction.
pub fn value_to_limbs(value: &BigUint, bits: u32) -> Vec<u64> {
    assert!((1..=64).contains(&bits), "limb width must be in 1..=64");
    let mask = if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    };
    let mut limbs = Vec::new();
    let mut rest = value.clone();
    while !rest.is_zero() {
        limbs.push(rest.iter_u64_digits().next().unwrap_or(0) & mask);
        rest >>= bits;
    }
    limbs
}

/// Reassembles a value from little-endian limbs of `bits` bits each. The result is not
/// reduced.
pub fn value_from_limbs(limbs: &[u64], bits: u32) -> BigUint {
    assert!((1..=64).contains(&bits), "limb width must be in 1..=64");
    limbs
        .iter()
        .rev()
        .fold(BigUint::zero(), |acc, limb| (acc << bits) + BigUint::from(*limb))
}

impl Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prime field with a modulus chosen at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimeField {
    modulus: Arc<BigUint>,
}

impl PrimeField {
    /// # Panics
    ///
    /// Panics if `modulus` is smaller than 2. Primality is not checked.
    pub fn new(modulus: BigUint) -> Self {
        assert!(modulus > BigUint::one(), "modulus must be at least 2");
        Self {
            modulus: Arc::new(modulus),
        }
    }

    pub fn goldilocks() -> Self {
        Self::new(BigUint::from(GOLDILOCKS_PRIME))
    }

    pub fn bn254() -> Self {
        Self::new(BigUint::from_slice(&BN254_PRIME_DIGITS))
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn zero(&self) -> FieldElement {
        FieldElement::zero()
    }

    pub fn one(&self) -> FieldElement {
        FieldElement::one()
    }

    pub fn is_canonical(&self, value: &BigUint) -> bool {
        value < &*self.modulus
    }

    pub fn reduce(&self, value: BigUint) -> FieldElement {
        if self.is_canonical(&value) {
            FieldElement(value)
        } else {
            FieldElement(value % &*self.modulus)
        }
    }

    pub fn element(&self, value: impl Into<BigUint>) -> FieldElement {
        self.reduce(value.into())
    }

    pub fn from_u64(&self, value: u64) -> FieldElement {
        self.reduce(BigUint::from(value))
    }

    pub fn from_i64(&self, value: i64) -> FieldElement {
        let magnitude = self.from_u64(value.unsigned_abs());
        if value < 0 {
            self.neg(&magnitude)
        } else {
            magnitude
        }
    }

    /// Brings an element that may come from another context into `[0, p)`.
    pub fn canonicalize(&self, value: &FieldElement) -> FieldElement {
        self.reduce(value.0.clone())
    }

    pub fn add(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.reduce(&a.0 + &b.0)
    }

    pub fn sub(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.reduce(&a.0 + &*self.modulus - &b.0)
    }

    pub fn mul(&self, a: &FieldElement, b: &FieldElement) -> FieldElement {
        self.reduce(&a.0 * &b.0)
    }

    pub fn neg(&self, a: &FieldElement) -> FieldElement {
        if a.is_zero() {
            FieldElement::zero()
        } else {
            FieldElement(&*self.modulus - &a.0)
        }
    }

    pub fn pow(&self, a: &FieldElement, exp: u32) -> FieldElement {
        FieldElement(a.0.modpow(&BigUint::from(exp), &self.modulus))
    }

    /// Inverse by Fermat's little theorem, so only meaningful for a prime modulus.
    pub fn inverse(&self, a: &FieldElement) -> Result<FieldElement, FieldError> {
        if a.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        let exp = &*self.modulus - BigUint::from(2u32);
        Ok(FieldElement(a.0.modpow(&exp, &self.modulus)))
    }

    pub fn div(&self, a: &FieldElement, b: &FieldElement) -> Result<FieldElement, FieldError> {
        Ok(self.mul(a, &self.inverse(b)?))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{value_from_limbs, FieldElement, FieldError, PrimeField, GOLDILOCKS_PRIME};

    const P: u128 = GOLDILOCKS_PRIME as u128;

    #[test]
    fn test_basic_ops() {
        let field = PrimeField::goldilocks();
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..1000 {
            let x = rng.gen::<u64>() % GOLDILOCKS_PRIME;
            let y = rng.gen::<u64>() % GOLDILOCKS_PRIME;
            let (fx, fy) = (field.from_u64(x), field.from_u64(y));
            let (x, y) = (x as u128, y as u128);
            assert_eq!(field.add(&fx, &fy), field.element((x + y) % P));
            assert_eq!(field.sub(&fx, &fy), field.element((x + P - y) % P));
            assert_eq!(field.mul(&fx, &fy), field.element((x * y) % P));
            assert_eq!(field.neg(&fx), field.element((P - x) % P));
        }
    }

    #[test]
    fn test_inverse() {
        let field = PrimeField::bn254();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..50 {
            let a = field.from_u64(rng.gen::<u64>() | 1);
            let inv = field.inverse(&a).unwrap();
            assert!(field.mul(&a, &inv).is_one());
        }
    }

    #[test]
    fn test_division_by_zero() {
        let field = PrimeField::goldilocks();
        assert_eq!(
            field.div(&field.one(), &FieldElement::zero()),
            Err(FieldError::DivisionByZero)
        );
    }

    #[test]
    fn test_from_i64() {
        let field = PrimeField::goldilocks();
        assert_eq!(field.from_i64(-1), field.from_u64(GOLDILOCKS_PRIME - 1));
        assert_eq!(field.from_i64(7), field.from_u64(7));
    }

    #[test]
    fn test_bn254_modulus() {
        let expected = BigUint::parse_bytes(
            b"21888242871839275222246405745257275088548364400416034343698204186575808495617",
            10,
        )
        .unwrap();
        assert_eq!(PrimeField::bn254().modulus(), &expected);
    }

    #[test]
    fn test_limbs() {
        let field = PrimeField::bn254();
        let value = field.neg(&field.from_u64(5));
        for bits in [8, 32, 64] {
            let limbs = value.to_limbs(bits);
            assert!(limbs.iter().all(|l| bits == 64 || *l < (1 << bits)));
            assert_eq!(&value_from_limbs(&limbs, bits), value.value());
        }
        assert!(FieldElement::zero().to_limbs(32).is_empty());
        assert_eq!(field.from_u64(1 << 32).to_limbs(32), vec![0, 1]);
    }
}
