//! The boundary to a STARK prover.
//!
//! Field elements cross it as little-endian limb sequences of a configurable width, with zero
//! as the empty sequence.
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::air::{check_trace, AirProgram, BoundaryConstraint, TraceError};
use crate::core::fields::{value_from_limbs, value_to_limbs, FieldElement, PrimeField};
use crate::core::poly::{Monomial, Polynomial};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Limb width {0} is not in 1..=64.")]
    LimbWidth(u32),
    #[error("Modulus {0} is not a valid field modulus.")]
    InvalidModulus(BigUint),
    #[error("Value {value} is not reduced modulo {modulus}.")]
    NonCanonicalValue { value: BigUint, modulus: BigUint },
    #[error("Proof covers a trace of {found} rows, the statement declares {expected}.")]
    TraceLength { expected: usize, found: usize },
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// `coefficient * prod(var ^ exp)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedTerm {
    pub coefficient: Vec<u64>,
    pub vars: Vec<(usize, u32)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBoundary {
    pub row: usize,
    pub register: usize,
    pub value: Vec<u64>,
}

/// What the verifier sees: the constraints and the public boundary values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub modulus: Vec<u64>,
    pub limb_bits: u32,
    pub register_count: usize,
    pub trace_len: usize,
    pub transition_constraints: Vec<Vec<SerializedTerm>>,
    pub boundary: Vec<SerializedBoundary>,
}

/// The statement together with the trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverInput {
    pub statement: Statement,
    pub trace: Vec<Vec<Vec<u64>>>,
}

impl ProverInput {
    /// # Panics
    ///
    /// Panics if `limb_bits` is not in `1..=64`.
    pub fn new(program: &AirProgram, limb_bits: u32) -> Self {
        let limbs = |value: &FieldElement| value.to_limbs(limb_bits);
        let statement = Statement {
            modulus: value_to_limbs(program.field.modulus(), limb_bits),
            limb_bits,
            register_count: program.register_count,
            trace_len: program.trace_len(),
            transition_constraints: program
                .transition_constraints
                .iter()
                .map(|poly| {
                    poly.terms()
                        .map(|(monomial, coef)| SerializedTerm {
                            coefficient: limbs(coef),
                            vars: monomial.vars.iter().map(|(v, e)| (*v, *e)).collect(),
                        })
                        .collect()
                })
                .collect(),
            boundary: program
                .boundary
                .iter()
                .map(|b| SerializedBoundary {
                    row: b.row,
                    register: b.register,
                    value: limbs(&b.value),
                })
                .collect(),
        };
        Self {
            statement,
            trace: encode_trace(&program.trace, limb_bits),
        }
    }
}

fn encode_trace(trace: &[Vec<FieldElement>], limb_bits: u32) -> Vec<Vec<Vec<u64>>> {
    trace
        .iter()
        .map(|row| row.iter().map(|v| v.to_limbs(limb_bits)).collect())
        .collect()
}

impl Statement {
    pub fn field(&self) -> Result<PrimeField, BackendError> {
        let bits = self.checked_limb_bits()?;
        let modulus = value_from_limbs(&self.modulus, bits);
        if modulus <= BigUint::from(1u32) {
            return Err(BackendError::InvalidModulus(modulus));
        }
        Ok(PrimeField::new(modulus))
    }

    fn checked_limb_bits(&self) -> Result<u32, BackendError> {
        match self.limb_bits {
            bits @ 1..=64 => Ok(bits),
            bits => Err(BackendError::LimbWidth(bits)),
        }
    }

    fn element(&self, field: &PrimeField, limbs: &[u64]) -> Result<FieldElement, BackendError> {
        let value = value_from_limbs(limbs, self.checked_limb_bits()?);
        if !field.is_canonical(&value) {
            return Err(BackendError::NonCanonicalValue {
                value,
                modulus: field.modulus().clone(),
            });
        }
        Ok(field.reduce(value))
    }

    /// Rebuilds the program this statement was serialized from, around `trace`.
    pub fn to_program(&self, trace: &[Vec<Vec<u64>>]) -> Result<AirProgram, BackendError> {
        let field = self.field()?;
        let transition_constraints = self
            .transition_constraints
            .iter()
            .map(|terms| {
                terms.iter().try_fold(Polynomial::zero(&field), |acc, term| {
                    let monomial = term
                        .vars
                        .iter()
                        .fold(Monomial::constant(), |m, (var, exp)| {
                            m * Monomial::power(*var, *exp)
                        });
                    let coef = self.element(&field, &term.coefficient)?;
                    Ok::<_, BackendError>(acc + Polynomial::term(&field, monomial, coef))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let boundary = self
            .boundary
            .iter()
            .map(|b| {
                Ok(BoundaryConstraint {
                    row: b.row,
                    register: b.register,
                    value: self.element(&field, &b.value)?,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        let trace = trace
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| self.element(&field, cell))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AirProgram {
            field,
            register_count: self.register_count,
            transition_constraints,
            boundary,
            trace,
        })
    }
}

/// A proof system over compiled programs.
pub trait StarkBackend {
    type Proof;
    type Error: std::error::Error;

    fn prove(&self, input: &ProverInput) -> Result<Self::Proof, Self::Error>;

    fn verify(&self, proof: &Self::Proof, statement: &Statement) -> Result<(), Self::Error>;
}

/// The whole trace, in the statement's limb encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceProof {
    pub trace: Vec<Vec<Vec<u64>>>,
}

/// Transparent reference backend: the proof is the trace itself and verification checks
/// every constraint on it directly. Neither succinct nor zero knowledge.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceCheckBackend;

impl StarkBackend for TraceCheckBackend {
    type Proof = TraceProof;
    type Error = BackendError;

    #[instrument(skip_all, fields(rows = input.statement.trace_len))]
    fn prove(&self, input: &ProverInput) -> Result<TraceProof, BackendError> {
        let proof = TraceProof {
            trace: input.trace.clone(),
        };
        self.verify(&proof, &input.statement)?;
        Ok(proof)
    }

    #[instrument(skip_all, fields(rows = statement.trace_len))]
    fn verify(&self, proof: &TraceProof, statement: &Statement) -> Result<(), BackendError> {
        if proof.trace.len() != statement.trace_len {
            return Err(BackendError::TraceLength {
                expected: statement.trace_len,
                found: proof.trace.len(),
            });
        }
        check_trace(&statement.to_program(&proof.trace)?)?;
        Ok(())
    }
}
