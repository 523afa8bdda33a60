use std::collections::BTreeSet;

use num_bigint::BigUint;
use tracing::{debug, info, instrument, span, trace, Level};

use super::gadgets::Gadget;
use super::path::{EquationCost, Step, SubstitutionPath};
use super::{SolverError, Witness};
use crate::core::fields::{FieldElement, PrimeField};
use crate::core::poly::{Monomial, Polynomial};
use crate::r1cs::{LinearCombination, R1csDocument, ONE_WIRE};

/// A constraint prepared for elimination.
struct PreparedConstraint {
    /// `A * B - C` over wire variables.
    poly: Polynomial,
    /// Referenced wires, without the constant wire.
    wires: BTreeSet<usize>,
}

/// Solver for one circuit, reusable across input assignments.
///
/// The per-constraint polynomials are built once on construction. Each solve repeatedly
/// scans the constraints still active, solving every constraint that has exactly one unknown
/// wire, until every wire is known.
pub struct WitnessSolver<'a> {
    doc: &'a R1csDocument,
    field: PrimeField,
    prepared: Vec<PreparedConstraint>,
    gadgets: Vec<Box<dyn Gadget>>,
}

impl<'a> WitnessSolver<'a> {
    #[instrument(skip_all, fields(n_constraints = doc.n_constraints()))]
    pub fn new(doc: &'a R1csDocument) -> Self {
        let field = doc.field();
        let prepared = doc
            .constraints
            .iter()
            .map(|c| PreparedConstraint {
                poly: c.to_polynomial(&field),
                wires: c.wires(),
            })
            .collect();
        Self {
            doc,
            field,
            prepared,
            gadgets: Vec::new(),
        }
    }

    pub fn with_gadget(mut self, gadget: impl Gadget + 'static) -> Self {
        self.gadgets.push(Box::new(gadget));
        self
    }

    pub fn field(&self) -> &PrimeField {
        &self.field
    }

    /// Solves for `inputs`, given as the public inputs followed by the private ones.
    pub fn solve(&self, inputs: &[BigUint]) -> Result<Witness, SolverError> {
        self.solve_recording(inputs).map(|(witness, _)| witness)
    }

    /// Like [`Self::solve`], also returning the order in which wires were resolved.
    #[instrument(skip_all, fields(n_wires = self.doc.n_vars()))]
    pub fn solve_recording(
        &self,
        inputs: &[BigUint],
    ) -> Result<(Witness, SubstitutionPath), SolverError> {
        let mut values = self.initial_assignment(inputs)?;
        let mut remaining = count_unknown(&values);
        let mut active = (0..self.prepared.len()).collect::<Vec<_>>();
        let mut path = SubstitutionPath::new(self.doc.fingerprint());

        let mut round = 0;
        while remaining > 0 {
            round += 1;

            for (index, gadget) in self.gadgets.iter().enumerate() {
                if self.run_gadget(gadget.as_ref(), &mut values)? > 0 {
                    path.push(Step::Gadget { index });
                }
            }

            let mut still_active = Vec::with_capacity(active.len());
            for constraint in active {
                let mut unknown = self.prepared[constraint]
                    .wires
                    .iter()
                    .filter(|wire| values[**wire].is_none());
                let (Some(&wire), None) = (unknown.next(), unknown.next()) else {
                    // Fully known constraints are done; the final check covers them.
                    if self.has_unknown(constraint, &values) {
                        still_active.push(constraint);
                    }
                    continue;
                };
                match self.eliminate(constraint, wire, &values)? {
                    Some(value) => {
                        trace!(
                            constraint,
                            wire,
                            residual = %self.residual(constraint, &values),
                            value = %value,
                            "Eliminated."
                        );
                        values[wire] = Some(value);
                        path.push(Step::Eliminate { constraint, wire });
                    }
                    None => still_active.push(constraint),
                }
            }
            active = still_active;

            let unknown = count_unknown(&values);
            let resolved = remaining.saturating_sub(unknown);
            remaining = unknown;
            debug!(round, resolved, remaining, "Solver round.");
            if resolved == 0 {
                return Err(SolverError::Unsatisfiable {
                    unknown: remaining,
                    first: first_unknown(&values),
                });
            }
        }

        let witness = self.finish(values)?;
        let cost = self.cost(&path);
        info!(
            rounds = round,
            steps = path.len(),
            multiplications = cost.multiplications,
            additions = cost.additions,
            "Witness solved."
        );
        Ok((witness, path))
    }

    /// Re-runs a recorded path without searching for solvable constraints.
    #[instrument(skip_all, fields(steps = path.len()))]
    pub fn solve_with_path(
        &self,
        inputs: &[BigUint],
        path: &SubstitutionPath,
    ) -> Result<Witness, SolverError> {
        let fingerprint = self.doc.fingerprint();
        if path.circuit() != fingerprint {
            return Err(SolverError::PathMismatch {
                expected: path.circuit(),
                found: fingerprint,
            });
        }
        let mut values = self.initial_assignment(inputs)?;
        for (step_index, step) in path.steps().iter().enumerate() {
            let invalid = SolverError::InvalidStep { step: step_index };
            match *step {
                Step::Eliminate { constraint, wire } => {
                    let prepared = self.prepared.get(constraint).ok_or(invalid.clone())?;
                    if !prepared.wires.contains(&wire)
                        || values[wire].is_some()
                        || self.n_unknown(constraint, &values) != 1
                    {
                        return Err(invalid);
                    }
                    let value = self.eliminate(constraint, wire, &values)?.ok_or(
                        SolverError::UnsupportedResidual {
                            constraint,
                            wire,
                            terms: self.residual(constraint, &values).n_terms(),
                        },
                    )?;
                    values[wire] = Some(value);
                }
                Step::Gadget { index } => {
                    let gadget = self.gadgets.get(index).ok_or(invalid.clone())?;
                    if self.run_gadget(gadget.as_ref(), &mut values)? == 0 {
                        return Err(invalid);
                    }
                }
            }
        }
        let unknown = count_unknown(&values);
        if unknown > 0 {
            return Err(SolverError::IncompletePath {
                unknown,
                first: first_unknown(&values),
            });
        }
        self.finish(values)
    }

    /// Operations needed to evaluate the eliminations of `path` as explicit equations
    /// `x = -(rest) / c`, where `rest` are the terms of the constraint without `x`.
    pub fn cost(&self, path: &SubstitutionPath) -> EquationCost {
        let field = &self.field;
        let mut cost = EquationCost::default();
        for (constraint, wire) in path.eliminations() {
            let Some(prepared) = self.prepared.get(constraint) else {
                continue;
            };
            let rest = prepared
                .poly
                .terms()
                .filter(|(monomial, _)| monomial.exponent(wire) == 0)
                .collect::<Vec<_>>();
            for (monomial, coef) in &rest {
                let factors = factor_degree(monomial) as usize + usize::from(!coef.is_one());
                cost.multiplications += factors.saturating_sub(1);
            }
            cost.additions += rest.len().saturating_sub(1);
            let scale = prepared
                .poly
                .terms()
                .find(|(monomial, _)| {
                    monomial.exponent(wire) == 1 && factor_degree(monomial) == 1
                })
                .and_then(|(_, c)| field.div(&field.neg(&field.one()), c).ok());
            if scale.is_some_and(|scale| !scale.is_one()) {
                cost.multiplications += 1;
            }
        }
        cost
    }

    fn initial_assignment(
        &self,
        inputs: &[BigUint],
    ) -> Result<Vec<Option<FieldElement>>, SolverError> {
        if inputs.len() != self.doc.n_inputs() {
            return Err(SolverError::InputCount {
                expected: self.doc.n_inputs(),
                found: inputs.len(),
            });
        }
        let mut values = vec![None; self.doc.n_vars()];
        values[ONE_WIRE] = Some(self.field.one());
        for (wire, input) in self.doc.input_wires().zip(inputs) {
            values[wire] = Some(self.field.reduce(input.clone()));
        }
        Ok(values)
    }

    fn run_gadget(
        &self,
        gadget: &dyn Gadget,
        values: &mut [Option<FieldElement>],
    ) -> Result<usize, SolverError> {
        gadget
            .apply(&self.field, values)
            .map_err(|source| SolverError::GadgetFailed {
                gadget: gadget.name().to_string(),
                source,
            })
    }

    fn n_unknown(&self, constraint: usize, values: &[Option<FieldElement>]) -> usize {
        self.prepared[constraint]
            .wires
            .iter()
            .filter(|wire| values[**wire].is_none())
            .count()
    }

    fn has_unknown(&self, constraint: usize, values: &[Option<FieldElement>]) -> bool {
        self.n_unknown(constraint, values) > 0
    }

    fn residual(&self, constraint: usize, values: &[Option<FieldElement>]) -> Polynomial {
        self.prepared[constraint].poly.evaluate_partial(values)
    }

    /// Solves `constraint` for its single unknown `wire`. Returns `None` when the residual has
    /// a shape that is skipped for this round.
    fn eliminate(
        &self,
        constraint: usize,
        wire: usize,
        values: &[Option<FieldElement>],
    ) -> Result<Option<FieldElement>, SolverError> {
        let field = &self.field;
        let residual = self.residual(constraint, values);
        let x = Monomial::var(wire);
        let x_squared = Monomial::power(wire, 2);
        let unsupported = || SolverError::UnsupportedResidual {
            constraint,
            wire,
            terms: residual.n_terms(),
        };

        match residual.n_terms() {
            3 => {
                let original = &self.doc.constraints[constraint];
                if !original.c.is_empty() {
                    return Err(unsupported());
                }
                // Three terms only arise when both factors depend on `x`.
                let root = match self.linear_root(&original.a, wire, values)? {
                    Some(root) => Some(root),
                    None => self.linear_root(&original.b, wire, values)?,
                };
                root.map(Some).ok_or_else(unsupported)
            }
            2 => {
                let (Some(c1), Some(c2)) = (
                    residual.coefficient(&x),
                    residual.coefficient(&x_squared),
                ) else {
                    // c0 + c1·x
                    let (Some(c0), Some(c1)) =
                        (residual.constant_term(), residual.coefficient(&x))
                    else {
                        return Err(unsupported());
                    };
                    return Ok(Some(field.div(&field.neg(c0), c1)?));
                };
                // c1·x + c2·x² = 0: the root at zero is divided out.
                Ok(Some(field.div(&field.neg(c1), c2)?))
            }
            // A zero constant is not stored, so `c·x` and `c·x²` are linear with root zero.
            1 if residual.coefficient(&x).is_some()
                || residual.coefficient(&x_squared).is_some() =>
            {
                Ok(Some(field.zero()))
            }
            _ => Ok(None),
        }
    }

    /// Root of `lc` as a linear function of `wire`, or `None` if `lc` does not depend on it.
    fn linear_root(
        &self,
        lc: &LinearCombination,
        wire: usize,
        values: &[Option<FieldElement>],
    ) -> Result<Option<FieldElement>, SolverError> {
        let field = &self.field;
        let Some(slope) = lc.coefficient(wire).filter(|c| !c.is_zero()) else {
            return Ok(None);
        };
        let mut offset = field.zero();
        for (other, coef) in lc.terms().filter(|(other, _)| *other != wire) {
            if let Some(value) = &values[other] {
                offset = field.add(&offset, &field.mul(coef, value));
            }
        }
        Ok(Some(field.div(&field.neg(&offset), slope)?))
    }

    fn finish(&self, values: Vec<Option<FieldElement>>) -> Result<Witness, SolverError> {
        let _span = span!(Level::DEBUG, "Final check").entered();
        let witness = Witness::new(values.into_iter().map(Option::unwrap_or_default).collect());
        witness.check(self.doc)?;
        Ok(witness)
    }
}

/// Degree of `monomial` without the constant wire.
fn factor_degree(monomial: &Monomial) -> u32 {
    monomial.degree() - monomial.exponent(ONE_WIRE)
}

fn count_unknown(values: &[Option<FieldElement>]) -> usize {
    values.iter().filter(|v| v.is_none()).count()
}

fn first_unknown(values: &[Option<FieldElement>]) -> usize {
    values.iter().position(Option::is_none).unwrap_or(values.len())
}

/// Solves `doc` for `inputs` without gadgets.
pub fn solve(doc: &R1csDocument, inputs: &[BigUint]) -> Result<Witness, SolverError> {
    WitnessSolver::new(doc).solve(inputs)
}

/// Replays `path` on `doc` for `inputs` without gadgets.
pub fn solve_with_path(
    doc: &R1csDocument,
    inputs: &[BigUint],
    path: &SubstitutionPath,
) -> Result<Witness, SolverError> {
    WitnessSolver::new(doc).solve_with_path(inputs, path)
}
