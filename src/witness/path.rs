use serde::{Deserialize, Serialize};

use crate::core::digest::CircuitDigest;

/// One resolution recorded by the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// `wire` was the single unknown of `constraint`.
    Eliminate { constraint: usize, wire: usize },
    /// The gadget at `index` in the solver's gadget list filled its wires.
    Gadget { index: usize },
}

/// Field operations of a set of elimination equations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquationCost {
    pub multiplications: usize,
    pub additions: usize,
}

/// The order in which a solve resolved wires, bound to the circuit it ran on.
///
/// Replaying a path skips the search for solvable constraints entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionPath {
    circuit: CircuitDigest,
    steps: Vec<Step>,
}

impl SubstitutionPath {
    pub fn new(circuit: CircuitDigest) -> Self {
        Self {
            circuit,
            steps: Vec::new(),
        }
    }

    pub fn circuit(&self) -> CircuitDigest {
        self.circuit
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The `(constraint, wire)` pairs of the elimination steps, in order.
    pub fn eliminations(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Eliminate { constraint, wire } => Some((*constraint, *wire)),
            Step::Gadget { .. } => None,
        })
    }
}
