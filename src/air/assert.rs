use thiserror::Error;

use super::{AirProgram, RegisterVars};
use crate::core::poly::PolyError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("Trace has {rows} rows; at least 2 are needed.")]
    TooShort { rows: usize },
    #[error("Row {row} has {found} cells, expected {expected}.")]
    Shape {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Transition constraint {constraint} does not vanish on rows {row} and {}.", .row + 1)]
    TransitionViolation { constraint: usize, row: usize },
    #[error("Boundary constraint on register {register} does not hold at row {row}.")]
    BoundaryViolation { row: usize, register: usize },
    #[error(transparent)]
    Poly(#[from] PolyError),
}

/// Evaluates every transition constraint on every pair of adjacent rows and every boundary
/// constraint on its cell.
pub fn check_trace(program: &AirProgram) -> Result<(), TraceError> {
    let field = &program.field;
    let trace = &program.trace;
    let vars = RegisterVars::new(program.register_count);
    if trace.len() < 2 {
        return Err(TraceError::TooShort { rows: trace.len() });
    }
    if let Some((row, values)) = trace
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != program.register_count)
    {
        return Err(TraceError::Shape {
            row,
            expected: program.register_count,
            found: values.len(),
        });
    }

    for (row, pair) in trace.windows(2).enumerate() {
        let assignment = vars.assignment(field, row, &pair[0], &pair[1]);
        for (constraint, poly) in program.transition_constraints.iter().enumerate() {
            if !poly.evaluate(&assignment)?.is_zero() {
                return Err(TraceError::TransitionViolation { constraint, row });
            }
        }
    }

    for boundary in &program.boundary {
        let holds = trace
            .get(boundary.row)
            .and_then(|values| values.get(boundary.register))
            .is_some_and(|value| {
                field.canonicalize(value) == field.canonicalize(&boundary.value)
            });
        if !holds {
            return Err(TraceError::BoundaryViolation {
                row: boundary.row,
                register: boundary.register,
            });
        }
    }
    Ok(())
}
