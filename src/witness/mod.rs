//! Witness generation by eliminating one unknown wire at a time.
use std::ops::Index;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::digest::CircuitDigest;
use crate::core::fields::{FieldElement, FieldError, PrimeField};
use crate::r1cs::{R1csDocument, ONE_WIRE};

pub mod gadgets;
pub mod path;
mod solver;

pub use gadgets::{BitDecomposition, Gadget, GadgetError};
pub use path::{EquationCost, Step, SubstitutionPath};
pub use solver::{solve, solve_with_path, WitnessSolver};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SolverError {
    #[error("Expected {expected} input values, got {found}.")]
    InputCount { expected: usize, found: usize },
    #[error("Expected a witness of {expected} values, got {found}.")]
    WitnessLength { expected: usize, found: usize },
    #[error("No constraint has a single unknown; {unknown} wires unresolved, first is {first}.")]
    Unsatisfiable { unknown: usize, first: usize },
    #[error("Witness does not satisfy constraint {constraint}.")]
    InvalidInput { constraint: usize },
    #[error("Wire 0 holds {found}, expected 1.")]
    ConstantWire { found: FieldElement },
    #[error("Constraint {constraint} leaves a residual in wire {wire} with {terms} terms that cannot be solved.")]
    UnsupportedResidual {
        constraint: usize,
        wire: usize,
        terms: usize,
    },
    #[error("Path was recorded for circuit {expected}, not {found}.")]
    PathMismatch {
        expected: CircuitDigest,
        found: CircuitDigest,
    },
    #[error("Path left {unknown} wires unresolved, first is {first}.")]
    IncompletePath { unknown: usize, first: usize },
    #[error("Path step {step} cannot be applied.")]
    InvalidStep { step: usize },
    #[error("Gadget {gadget} failed: {source}")]
    GadgetFailed {
        gadget: String,
        #[source]
        source: GadgetError,
    },
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// A complete assignment: one value per wire, with wire 0 equal to one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness(Vec<FieldElement>);

impl Witness {
    pub fn new(values: Vec<FieldElement>) -> Self {
        Self(values)
    }

    /// Reduces arbitrary integers into `field`.
    pub fn from_values(field: &PrimeField, values: &[BigUint]) -> Self {
        Self(values.iter().map(|v| field.reduce(v.clone())).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[FieldElement] {
        &self.0
    }

    /// Checks that the witness fits the document and satisfies every constraint.
    pub fn check(&self, doc: &R1csDocument) -> Result<(), SolverError> {
        if self.len() != doc.n_vars() {
            return Err(SolverError::WitnessLength {
                expected: doc.n_vars(),
                found: self.len(),
            });
        }
        if !self.0[ONE_WIRE].is_one() {
            return Err(SolverError::ConstantWire {
                found: self.0[ONE_WIRE].clone(),
            });
        }
        let field = doc.field();
        match doc
            .constraints
            .iter()
            .position(|c| !c.residual(&field, &self.0).is_zero())
        {
            Some(constraint) => Err(SolverError::InvalidInput { constraint }),
            None => Ok(()),
        }
    }
}

impl Index<usize> for Witness {
    type Output = FieldElement;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl AsRef<[FieldElement]> for Witness {
    fn as_ref(&self) -> &[FieldElement] {
        &self.0
    }
}
