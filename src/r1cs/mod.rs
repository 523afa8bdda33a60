//! Rank-1 constraint systems as read from the iden3 binary container.
//!
//! A constraint `(A, B, C)` holds for a witness `w` when `(A·w) * (B·w) - (C·w) = 0`. Wire 0 is
//! the constant one. The remaining wires are laid out as outputs, public inputs, private
//! inputs and then internal wires, in that order.
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use num_bigint::BigUint;

use crate::core::digest::{Blake2sHasher, CircuitDigest};
use crate::core::fields::{FieldElement, PrimeField};
use crate::core::poly::Polynomial;

pub mod reader;
pub mod writer;

pub use reader::{parse, FormatError, ParseError, R1csReader, SectionKind, UnsupportedFeatureError};

/// Wire holding the constant one.
pub const ONE_WIRE: usize = 0;

/// Sparse map from wire index to coefficient. Absent wires have coefficient zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearCombination {
    terms: BTreeMap<usize, FieldElement>,
}

impl LinearCombination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coefficient of `wire`, returning the previous one if the wire was present.
    pub fn insert(&mut self, wire: usize, coef: FieldElement) -> Option<FieldElement> {
        self.terms.insert(wire, coef)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn coefficient(&self, wire: usize) -> Option<&FieldElement> {
        self.terms.get(&wire)
    }

    pub fn terms(&self) -> impl Iterator<Item = (usize, &FieldElement)> {
        self.terms.iter().map(|(wire, coef)| (*wire, coef))
    }

    pub fn wires(&self) -> impl Iterator<Item = usize> + '_ {
        self.terms.keys().copied()
    }

    /// Dot product with a full witness.
    pub fn evaluate(&self, field: &PrimeField, witness: &[FieldElement]) -> FieldElement {
        self.terms
            .iter()
            .fold(FieldElement::zero(), |acc, (wire, coef)| {
                field.add(&acc, &field.mul(coef, &witness[*wire]))
            })
    }

    /// Builds `sum(coef * var(wire))`, with wire `i` as polynomial variable `i`.
    pub fn to_polynomial(&self, field: &PrimeField) -> Polynomial {
        self.substitute(field, |wire| Polynomial::var(field, wire))
    }

    /// Builds `sum(coef * f(wire))`, letting the caller decide what each wire stands for.
    pub fn substitute(
        &self,
        field: &PrimeField,
        mut f: impl FnMut(usize) -> Polynomial,
    ) -> Polynomial {
        self.terms.iter().fold(Polynomial::zero(field), |acc, (wire, coef)| {
            acc + f(*wire).scale(coef)
        })
    }

    /// Fallible [`Self::substitute`].
    pub fn try_substitute<E>(
        &self,
        field: &PrimeField,
        mut f: impl FnMut(usize) -> Result<Polynomial, E>,
    ) -> Result<Polynomial, E> {
        let mut res = Polynomial::zero(field);
        for (wire, coef) in &self.terms {
            res += f(*wire)?.scale(coef);
        }
        Ok(res)
    }
}

impl FromIterator<(usize, FieldElement)> for LinearCombination {
    fn from_iter<T: IntoIterator<Item = (usize, FieldElement)>>(iter: T) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Constraint {
    pub a: LinearCombination,
    pub b: LinearCombination,
    pub c: LinearCombination,
}

impl Constraint {
    pub fn new(a: LinearCombination, b: LinearCombination, c: LinearCombination) -> Self {
        Self { a, b, c }
    }

    pub fn linear_combinations(&self) -> [&LinearCombination; 3] {
        [&self.a, &self.b, &self.c]
    }

    /// Every wire referenced by `A`, `B` or `C`, except the constant wire.
    pub fn wires(&self) -> BTreeSet<usize> {
        self.linear_combinations()
            .into_iter()
            .flat_map(LinearCombination::wires)
            .filter(|wire| *wire != ONE_WIRE)
            .collect()
    }

    /// `A * B - C` with wire `i` as polynomial variable `i`.
    pub fn to_polynomial(&self, field: &PrimeField) -> Polynomial {
        self.substitute(field, |wire| Polynomial::var(field, wire))
    }

    /// `A * B - C` with every wire replaced by `f(wire)`.
    pub fn substitute(
        &self,
        field: &PrimeField,
        mut f: impl FnMut(usize) -> Polynomial,
    ) -> Polynomial {
        let [a, b, c] = self.linear_combinations().map(|lc| lc.substitute(field, &mut f));
        a * b - c
    }

    /// Fallible [`Self::substitute`].
    pub fn try_substitute<E>(
        &self,
        field: &PrimeField,
        mut f: impl FnMut(usize) -> Result<Polynomial, E>,
    ) -> Result<Polynomial, E> {
        let a = self.a.try_substitute(field, &mut f)?;
        let b = self.b.try_substitute(field, &mut f)?;
        let c = self.c.try_substitute(field, &mut f)?;
        Ok(a * b - c)
    }

    /// `(A·w) * (B·w) - (C·w)`; zero iff the witness satisfies the constraint.
    pub fn residual(&self, field: &PrimeField, witness: &[FieldElement]) -> FieldElement {
        let a = self.a.evaluate(field, witness);
        let b = self.b.evaluate(field, witness);
        let c = self.c.evaluate(field, witness);
        field.sub(&field.mul(&a, &b), &c)
    }
}

/// A parsed circuit. Never mutated after parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R1csDocument {
    /// Byte width of the prime and of every coefficient in the container.
    pub field_size: u32,
    pub prime: BigUint,
    pub n_wires: u32,
    pub n_outputs: u32,
    pub n_pub_inputs: u32,
    pub n_prv_inputs: u32,
    pub n_labels: i64,
    pub constraints: Vec<Constraint>,
}

impl R1csDocument {
    pub fn n_vars(&self) -> usize {
        self.n_wires as usize
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn n_inputs(&self) -> usize {
        (self.n_pub_inputs + self.n_prv_inputs) as usize
    }

    pub fn field(&self) -> PrimeField {
        PrimeField::new(self.prime.clone())
    }

    pub fn output_wires(&self) -> Range<usize> {
        1..1 + self.n_outputs as usize
    }

    pub fn public_input_wires(&self) -> Range<usize> {
        let start = self.output_wires().end;
        start..start + self.n_pub_inputs as usize
    }

    pub fn private_input_wires(&self) -> Range<usize> {
        let start = self.public_input_wires().end;
        start..start + self.n_prv_inputs as usize
    }

    /// Public then private inputs, the order in which inputs are supplied to the solver.
    pub fn input_wires(&self) -> Range<usize> {
        self.public_input_wires().start..self.private_input_wires().end
    }

    /// Blake2s digest of the prime, the wire layout and every constraint.
    pub fn fingerprint(&self) -> CircuitDigest {
        let mut hasher = Blake2sHasher::new();
        hasher.update_prefixed(&self.prime.to_bytes_le());
        for count in [
            self.n_wires,
            self.n_outputs,
            self.n_pub_inputs,
            self.n_prv_inputs,
        ] {
            hasher.update_u64(count as u64);
        }
        hasher.update_u64(self.constraints.len() as u64);
        for constraint in &self.constraints {
            for lc in constraint.linear_combinations() {
                hasher.update_u64(lc.len() as u64);
                for (wire, coef) in lc.terms() {
                    hasher.update_u64(wire as u64);
                    hasher.update_prefixed(&coef.value().to_bytes_le());
                }
            }
        }
        hasher.finalize()
    }
}
