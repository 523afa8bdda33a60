//! Compilation of an R1CS and its witness into an algebraic execution trace.
//!
//! Every constraint polynomial is over `2 * R + 1` variables, where `R` is the register count:
//! variable 0 is the cycle (the index of the current row), `1..=R` are the registers of the
//! current row and `R + 1..=2 * R` the registers of the next row. Transition constraints must
//! vanish on every pair of adjacent rows.
use std::fmt;
use std::ops::RangeInclusive;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, span, Level};

use crate::core::fields::{FieldElement, PrimeField, GOLDILOCKS_PRIME};
use crate::core::poly::Polynomial;
use crate::r1cs::R1csDocument;
use crate::witness::Witness;

pub mod assert;
mod packed;
pub mod packing;
mod single_row;

pub use assert::{check_trace, TraceError};
pub use packed::PackedLayout;
pub use single_row::SingleRowLayout;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("Circuit prime {document} does not match the configured modulus {configured}.")]
    PrimeMismatch {
        document: BigUint,
        configured: BigUint,
    },
    #[error("Expected a witness of {expected} values, got {found}.")]
    WitnessLength { expected: usize, found: usize },
    #[error("Layout needs {required} registers, the limit is {limit}.")]
    PackingInfeasible { required: usize, limit: usize },
    #[error("Wire {wire} of constraint {constraint} is not placed in its row pair.")]
    UnresolvedWire { constraint: usize, wire: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One register per wire, two identical rows.
    SingleRow,
    /// Wires packed into rows of a narrower trace.
    Packed,
    /// Single row for circuits up to [`PackingConfig::single_row_max_width`] wires, packed
    /// otherwise.
    #[default]
    Auto,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::SingleRow => write!(f, "single_row"),
            Strategy::Packed => write!(f, "packed"),
            Strategy::Auto => write!(f, "auto"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackingConfig {
    /// Number of groups merging stops at. Defaults to `max(2, ceil(sqrt(n_constraints)))`.
    pub target_groups: Option<usize>,
    pub single_row_max_width: usize,
    /// Upper bound on the register count of any layout.
    pub max_register_count: Option<usize>,
}

impl PackingConfig {
    pub const DEFAULT_SINGLE_ROW_MAX_WIDTH: usize = 64;

    pub fn target_groups(&self, n_constraints: usize) -> usize {
        self.target_groups
            .unwrap_or_else(|| (n_constraints as f64).sqrt().ceil() as usize)
            .max(2)
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            target_groups: None,
            single_row_max_width: Self::DEFAULT_SINGLE_ROW_MAX_WIDTH,
            max_register_count: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirConfig {
    modulus: BigUint,
    limb_bits: u32,
    pub strategy: Strategy,
    pub packing: PackingConfig,
}

impl AirConfig {
    const LIMB_BITS_RANGE: RangeInclusive<u32> = 1..=64;
    pub const DEFAULT_LIMB_BITS: u32 = 32;

    /// # Panics
    ///
    /// Panics if `limb_bits` is not in `1..=64` or `modulus` is smaller than 2.
    pub fn new(modulus: BigUint, limb_bits: u32) -> Self {
        assert!(Self::LIMB_BITS_RANGE.contains(&limb_bits));
        assert!(modulus > BigUint::from(1u32));
        Self {
            modulus,
            limb_bits,
            strategy: Strategy::default(),
            packing: PackingConfig::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_packing(mut self, packing: PackingConfig) -> Self {
        self.packing = packing;
        self
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn limb_bits(&self) -> u32 {
        self.limb_bits
    }

    /// Strategy to use for a circuit with `n_vars` wires.
    ///
    /// `Auto` packs once the single row is wider than `single_row_max_width` or than the
    /// register limit.
    pub fn resolve_strategy(&self, n_vars: usize) -> Strategy {
        let fits = |limit: Option<usize>| limit.map_or(true, |limit| n_vars <= limit);
        match self.strategy {
            Strategy::Auto
                if n_vars <= self.packing.single_row_max_width
                    && fits(self.packing.max_register_count) =>
            {
                Strategy::SingleRow
            }
            Strategy::Auto => Strategy::Packed,
            strategy => strategy,
        }
    }
}

impl Default for AirConfig {
    fn default() -> Self {
        Self::new(BigUint::from(GOLDILOCKS_PRIME), Self::DEFAULT_LIMB_BITS)
    }
}

/// `register` must equal `value` at `row`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConstraint {
    pub row: usize,
    pub register: usize,
    pub value: FieldElement,
}

/// A boundary cell that takes the witness value of `wire`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireBoundary {
    pub row: usize,
    pub register: usize,
    pub wire: usize,
}

/// Maps registers to polynomial variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterVars {
    pub register_count: usize,
}

impl RegisterVars {
    pub const CYCLE: usize = 0;

    pub fn new(register_count: usize) -> Self {
        Self { register_count }
    }

    pub fn n_vars(&self) -> usize {
        2 * self.register_count + 1
    }

    pub fn current(&self, register: usize) -> usize {
        1 + register
    }

    pub fn next(&self, register: usize) -> usize {
        1 + self.register_count + register
    }

    pub fn cycle_poly(&self, field: &PrimeField) -> Polynomial {
        Polynomial::var(field, Self::CYCLE)
    }

    pub fn current_poly(&self, field: &PrimeField, register: usize) -> Polynomial {
        Polynomial::var(field, self.current(register))
    }

    pub fn next_poly(&self, field: &PrimeField, register: usize) -> Polynomial {
        Polynomial::var(field, self.next(register))
    }

    /// The assignment a transition constraint is evaluated at for rows `row` and `row + 1`.
    pub fn assignment(
        &self,
        field: &PrimeField,
        row: usize,
        current: &[FieldElement],
        next: &[FieldElement],
    ) -> Vec<FieldElement> {
        let mut values = Vec::with_capacity(self.n_vars());
        values.push(field.from_u64(row as u64));
        values.extend_from_slice(current);
        values.extend_from_slice(next);
        values
    }
}

/// The witness independent part of a compiled circuit.
pub trait AirLayout: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn register_count(&self) -> usize;

    fn trace_len(&self) -> usize;

    fn transition_constraints(&self) -> &[Polynomial];

    /// Boundary constraints with fixed values.
    fn static_boundary(&self) -> &[BoundaryConstraint];

    /// Boundary constraints whose value is read from the witness.
    fn wire_boundary(&self) -> &[WireBoundary];

    fn trace(&self, witness: &Witness) -> Vec<Vec<FieldElement>>;
}

/// Everything a prover needs: constraints, boundary and a trace satisfying both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AirProgram {
    pub field: PrimeField,
    pub register_count: usize,
    pub transition_constraints: Vec<Polynomial>,
    pub boundary: Vec<BoundaryConstraint>,
    pub trace: Vec<Vec<FieldElement>>,
}

impl AirProgram {
    pub fn trace_len(&self) -> usize {
        self.trace.len()
    }

    pub fn check(&self) -> Result<(), TraceError> {
        check_trace(self)
    }
}

/// Compiler for one circuit.
///
/// Construction checks the prime and builds the layout, which only depends on the circuit.
/// [`AirCompiler::compile`] can then be called once per witness.
pub struct AirCompiler {
    field: PrimeField,
    n_vars: usize,
    layout: Box<dyn AirLayout>,
}

impl AirCompiler {
    #[instrument(skip_all, fields(strategy = %config.strategy))]
    pub fn new(doc: &R1csDocument, config: &AirConfig) -> Result<Self, CompileError> {
        if &doc.prime != config.modulus() {
            return Err(CompileError::PrimeMismatch {
                document: doc.prime.clone(),
                configured: config.modulus().clone(),
            });
        }
        let layout: Box<dyn AirLayout> = match config.resolve_strategy(doc.n_vars()) {
            Strategy::SingleRow => Box::new(SingleRowLayout::new(doc)),
            _ => Box::new(PackedLayout::new(doc, &config.packing)?),
        };
        if let Some(limit) = config.packing.max_register_count {
            if layout.register_count() > limit {
                return Err(CompileError::PackingInfeasible {
                    required: layout.register_count(),
                    limit,
                });
            }
        }
        info!(
            strategy = %layout.strategy(),
            registers = layout.register_count(),
            rows = layout.trace_len(),
            constraints = layout.transition_constraints().len(),
            "Layout built."
        );
        Ok(Self {
            field: doc.field(),
            n_vars: doc.n_vars(),
            layout,
        })
    }

    pub fn layout(&self) -> &dyn AirLayout {
        self.layout.as_ref()
    }

    pub fn register_count(&self) -> usize {
        self.layout.register_count()
    }

    #[instrument(skip_all)]
    pub fn compile(&self, witness: &Witness) -> Result<AirProgram, CompileError> {
        if witness.len() != self.n_vars {
            return Err(CompileError::WitnessLength {
                expected: self.n_vars,
                found: witness.len(),
            });
        }
        let trace = {
            let _span = span!(Level::INFO, "Trace generation").entered();
            self.layout.trace(witness)
        };
        let boundary = self
            .layout
            .static_boundary()
            .iter()
            .cloned()
            .chain(self.layout.wire_boundary().iter().map(|b| BoundaryConstraint {
                row: b.row,
                register: b.register,
                value: witness[b.wire].clone(),
            }))
            .collect();
        Ok(AirProgram {
            field: self.field.clone(),
            register_count: self.layout.register_count(),
            transition_constraints: self.layout.transition_constraints().to_vec(),
            boundary,
            trace,
        })
    }
}

/// Builds the layout for `doc` and compiles `witness` in one go.
pub fn compile(
    doc: &R1csDocument,
    witness: &Witness,
    config: &AirConfig,
) -> Result<AirProgram, CompileError> {
    AirCompiler::new(doc, config)?.compile(witness)
}
