use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fields::{FieldElement, PrimeField};

const SUPERSCRIPTS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];
const SUBSCRIPTS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PolyError {
    #[error("No value assigned to variable {variable}.")]
    MissingAssignment { variable: usize },
}

/// A monic monomial consists of a list of variables and their exponents.
///
/// Exponents are never zero, so the constant monomial is the empty map and two equal
/// monomials always have equal keys.
#[derive(
    Debug, Default, Hash, PartialEq, PartialOrd, Eq, Ord, Clone, Serialize, Deserialize,
)]
pub struct Monomial {
    /// The variables of the monomial and their exponents.
    pub vars: BTreeMap<usize, u32>,
}

impl Monomial {
    pub fn constant() -> Self {
        Self::default()
    }

    pub fn var(var: usize) -> Self {
        Self::power(var, 1)
    }

    pub fn power(var: usize, exp: u32) -> Self {
        let mut vars = BTreeMap::new();
        if exp > 0 {
            vars.insert(var, exp);
        }
        Self { vars }
    }

    pub fn is_constant(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn degree(&self) -> u32 {
        self.vars.values().sum()
    }

    pub fn exponent(&self, var: usize) -> u32 {
        self.vars.get(&var).copied().unwrap_or(0)
    }
}

#[allow(clippy::suspicious_arithmetic_impl)]
impl Mul for Monomial {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut vars = self.vars;
        for (var, exp) in rhs.vars {
            *vars.entry(var).or_insert(0) += exp;
        }
        Monomial { vars }
    }
}

/// A polynomial consists of a list of monomials with nonzero coefficients.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Polynomial {
    field: PrimeField,
    monomials: BTreeMap<Monomial, FieldElement>,
}

impl Polynomial {
    pub fn zero(field: &PrimeField) -> Self {
        Self {
            field: field.clone(),
            monomials: BTreeMap::new(),
        }
    }

    pub fn one(field: &PrimeField) -> Self {
        Self::constant(field, FieldElement::one())
    }

    pub fn constant(field: &PrimeField, value: FieldElement) -> Self {
        Self::term(field, Monomial::constant(), value)
    }

    pub fn var(field: &PrimeField, var: usize) -> Self {
        Self::term(field, Monomial::var(var), FieldElement::one())
    }

    pub fn term(field: &PrimeField, monomial: Monomial, coef: FieldElement) -> Self {
        let mut poly = Self::zero(field);
        poly.add_term(monomial, coef);
        poly
    }

    pub fn field(&self) -> &PrimeField {
        &self.field
    }

    pub fn is_zero(&self) -> bool {
        self.monomials.is_empty()
    }

    pub fn n_terms(&self) -> usize {
        self.monomials.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &FieldElement)> {
        self.monomials.iter()
    }

    pub fn coefficient(&self, monomial: &Monomial) -> Option<&FieldElement> {
        self.monomials.get(monomial)
    }

    pub fn constant_term(&self) -> Option<&FieldElement> {
        self.coefficient(&Monomial::constant())
    }

    pub fn degree(&self) -> u32 {
        self.monomials.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn variables(&self) -> BTreeSet<usize> {
        self.monomials
            .keys()
            .flat_map(|m| m.vars.keys().copied())
            .collect()
    }

    pub fn scale(self, factor: &FieldElement) -> Self {
        let mut res = Self::zero(&self.field);
        for (monomial, coef) in self.monomials {
            let coef = res.field.mul(&coef, factor);
            res.add_term(monomial, coef);
        }
        res
    }

    /// Substitutes every variable that has a value in `assignment`. Variables that are
    /// unassigned, or beyond the end of `assignment`, stay symbolic.
    pub fn evaluate_partial(&self, assignment: &[Option<FieldElement>]) -> Self {
        let mut res = Self::zero(&self.field);
        for (monomial, coef) in &self.monomials {
            let mut coef = coef.clone();
            let mut residual = Monomial::constant();
            for (&var, &exp) in &monomial.vars {
                match assignment.get(var).and_then(Option::as_ref) {
                    Some(value) => coef = self.field.mul(&coef, &self.field.pow(value, exp)),
                    None => {
                        residual.vars.insert(var, exp);
                    }
                }
            }
            res.add_term(residual, coef);
        }
        res
    }

    pub fn evaluate(&self, values: &[FieldElement]) -> Result<FieldElement, PolyError> {
        let mut res = FieldElement::zero();
        for (monomial, coef) in &self.monomials {
            let mut term = coef.clone();
            for (&var, &exp) in &monomial.vars {
                let value = values
                    .get(var)
                    .ok_or(PolyError::MissingAssignment { variable: var })?;
                term = self.field.mul(&term, &self.field.pow(value, exp));
            }
            res = self.field.add(&res, &term);
        }
        Ok(res)
    }

    fn add_term(&mut self, monomial: Monomial, coef: FieldElement) {
        if coef.is_zero() {
            return;
        }
        if let Some(existing) = self.monomials.get_mut(&monomial) {
            let res = self.field.add(existing, &coef);
            if res.is_zero() {
                self.monomials.remove(&monomial);
            } else {
                *existing = res;
            }
        } else {
            self.monomials.insert(monomial, coef);
        }
    }
}

impl Add for Polynomial {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        debug_assert_eq!(self.field, rhs.field);
        let mut res = self;
        for (monomial, coef) in rhs.monomials {
            res.add_term(monomial, coef);
        }
        res
    }
}

impl Sub for Polynomial {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + rhs.neg()
    }
}

impl Mul for Polynomial {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        debug_assert_eq!(self.field, rhs.field);
        let mut res = Self::zero(&self.field);
        for (monomial1, coef1) in &self.monomials {
            for (monomial2, coef2) in &rhs.monomials {
                let monomial = monomial1.clone() * monomial2.clone();
                let coef = self.field.mul(coef1, coef2);
                res.add_term(monomial, coef);
            }
        }
        res
    }
}

impl Neg for Polynomial {
    type Output = Self;
    fn neg(self) -> Self {
        let field = self.field;
        let monomials = self
            .monomials
            .into_iter()
            .map(|(m, c)| {
                let c = field.neg(&c);
                (m, c)
            })
            .collect();
        Self { field, monomials }
    }
}

impl AddAssign for Polynomial {
    fn add_assign(&mut self, rhs: Self) {
        for (monomial, coef) in rhs.monomials {
            self.add_term(monomial, coef);
        }
    }
}

impl SubAssign for Polynomial {
    fn sub_assign(&mut self, rhs: Self) {
        *self += rhs.neg();
    }
}

impl MulAssign for Polynomial {
    fn mul_assign(&mut self, rhs: Self) {
        *self = self.clone() * rhs;
    }
}

fn to_superscript(n: u32) -> String {
    n.to_string()
        .bytes()
        .map(|d| SUPERSCRIPTS[(d - b'0') as usize])
        .collect()
}

fn to_subscript(n: usize) -> String {
    n.to_string()
        .bytes()
        .map(|d| SUBSCRIPTS[(d - b'0') as usize])
        .collect()
}

impl Display for Monomial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (var, exp) in self.vars.iter() {
            write!(
                f,
                "x{}{}",
                to_subscript(*var),
                if *exp == 1 {
                    "".to_string()
                } else {
                    to_superscript(*exp)
                }
            )?;
        }
        Ok(())
    }
}

impl Display for Polynomial {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.monomials.is_empty() {
            return write!(f, "0");
        }
        for (i, (monomial, coef)) in self.monomials.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if monomial.is_constant() || !coef.is_one() {
                write!(f, "{}", coef)?;
            }
            write!(f, "{}", monomial)?;
        }
        Ok(())
    }
}
