use tracing::instrument;

use super::{AirLayout, BoundaryConstraint, RegisterVars, Strategy, WireBoundary};
use crate::core::fields::FieldElement;
use crate::core::poly::Polynomial;
use crate::r1cs::{R1csDocument, ONE_WIRE};
use crate::witness::Witness;

/// One register per wire and a trace of two equal rows.
///
/// Every R1CS constraint becomes one transition constraint over the current row. A copy
/// constraint per register ties the second row to the first.
pub struct SingleRowLayout {
    register_count: usize,
    transition_constraints: Vec<Polynomial>,
    static_boundary: Vec<BoundaryConstraint>,
    wire_boundary: Vec<WireBoundary>,
}

impl SingleRowLayout {
    #[instrument(skip_all, fields(n_wires = doc.n_vars()))]
    pub fn new(doc: &R1csDocument) -> Self {
        let field = doc.field();
        let vars = RegisterVars::new(doc.n_vars());
        let register = |wire: usize| match wire {
            ONE_WIRE => Polynomial::one(&field),
            wire => vars.current_poly(&field, wire),
        };

        let mut transition_constraints = doc
            .constraints
            .iter()
            .map(|c| c.substitute(&field, register))
            .collect::<Vec<_>>();
        transition_constraints.extend(
            (0..vars.register_count)
                .map(|i| vars.next_poly(&field, i) - vars.current_poly(&field, i)),
        );

        Self {
            register_count: vars.register_count,
            transition_constraints,
            static_boundary: vec![BoundaryConstraint {
                row: 0,
                register: ONE_WIRE,
                value: FieldElement::one(),
            }],
            wire_boundary: doc
                .public_input_wires()
                .map(|wire| WireBoundary {
                    row: 1,
                    register: wire,
                    wire,
                })
                .collect(),
        }
    }
}

impl AirLayout for SingleRowLayout {
    fn strategy(&self) -> Strategy {
        Strategy::SingleRow
    }

    fn register_count(&self) -> usize {
        self.register_count
    }

    fn trace_len(&self) -> usize {
        2
    }

    fn transition_constraints(&self) -> &[Polynomial] {
        &self.transition_constraints
    }

    fn static_boundary(&self) -> &[BoundaryConstraint] {
        &self.static_boundary
    }

    fn wire_boundary(&self) -> &[WireBoundary] {
        &self.wire_boundary
    }

    fn trace(&self, witness: &Witness) -> Vec<Vec<FieldElement>> {
        let row = witness.values().to_vec();
        vec![row.clone(), row]
    }
}
