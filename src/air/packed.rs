use tracing::{info, instrument};

use super::packing::{pack, Packing};
use super::{
    AirLayout, BoundaryConstraint, CompileError, PackingConfig, RegisterVars, Strategy,
    WireBoundary,
};
use crate::core::fields::{FieldElement, PrimeField};
use crate::core::poly::Polynomial;
use crate::r1cs::{R1csDocument, ONE_WIRE};
use crate::witness::Witness;

/// Several wires per row, with registers laid out as `[selectors | globals | payload]`.
///
/// Row `i` has selector `i` set and all others clear. Each R1CS constraint is placed on the
/// row pair `(r, r + 1)` that holds its wires and multiplied by selector `r`, so it only
/// binds on that pair.
pub struct PackedLayout {
    packing: Packing,
    register_count: usize,
    transition_constraints: Vec<Polynomial>,
    static_boundary: Vec<BoundaryConstraint>,
    wire_boundary: Vec<WireBoundary>,
}

impl PackedLayout {
    #[instrument(skip_all, fields(n_wires = doc.n_vars()))]
    pub fn new(doc: &R1csDocument, config: &PackingConfig) -> Result<Self, CompileError> {
        let packing = pack(doc, config);
        let field = doc.field();
        let columns = Columns::new(&packing);
        let vars = RegisterVars::new(columns.register_count());
        let n = packing.n_rows();

        let mut constraints = Vec::new();
        for (i, constraint) in doc.constraints.iter().enumerate() {
            let r = packing.homes[i].min(n - 2);
            let poly = constraint.try_substitute(&field, |wire| {
                if wire == ONE_WIRE {
                    Ok(Polynomial::one(&field))
                } else if let Some(k) = packing.global_index(wire) {
                    Ok(vars.current_poly(&field, columns.global(k)))
                } else if let Some(j) = packing.payload_index(r, wire) {
                    Ok(vars.current_poly(&field, columns.payload(j)))
                } else if let Some(j) = packing.payload_index(r + 1, wire) {
                    Ok(vars.next_poly(&field, columns.payload(j)))
                } else {
                    Err(CompileError::UnresolvedWire {
                        constraint: i,
                        wire,
                    })
                }
            })?;
            constraints.push(vars.current_poly(&field, columns.selector(r)) * poly);
        }
        let n_r1cs = constraints.len();

        constraints.extend(selector_constraints(&field, &vars, &columns, n));
        constraints.extend((0..packing.globals.len()).map(|k| {
            let column = columns.global(k);
            vars.next_poly(&field, column) - vars.current_poly(&field, column)
        }));

        // A wire local to two adjacent rows has equal cells on both.
        for r in 0..n - 1 {
            for (a, wire) in packing.rows[r].iter().enumerate() {
                if let Some(b) = packing.payload_index(r + 1, *wire) {
                    let diff = vars.current_poly(&field, columns.payload(a))
                        - vars.next_poly(&field, columns.payload(b));
                    constraints.push(vars.current_poly(&field, columns.selector(r)) * diff);
                }
            }
        }

        // Padding cells are zero. The last row is only ever the next row of a pair.
        for (r, row) in packing.rows.iter().enumerate() {
            for j in row.len()..columns.width {
                constraints.push(if r < n - 1 {
                    vars.current_poly(&field, columns.selector(r))
                        * vars.current_poly(&field, columns.payload(j))
                } else {
                    vars.next_poly(&field, columns.selector(r))
                        * vars.next_poly(&field, columns.payload(j))
                });
            }
        }

        let static_boundary = (0..n)
            .map(|row| BoundaryConstraint {
                row,
                register: columns.selector(row),
                value: FieldElement::one(),
            })
            .collect();
        let wire_boundary = doc
            .public_input_wires()
            .filter_map(|wire| match packing.global_index(wire) {
                Some(k) => Some(WireBoundary {
                    row: 0,
                    register: columns.global(k),
                    wire,
                }),
                None => {
                    let row = *packing.rows_of(wire).first()?;
                    let j = packing.payload_index(row, wire)?;
                    Some(WireBoundary {
                        row,
                        register: columns.payload(j),
                        wire,
                    })
                }
            })
            .collect();

        info!(
            rows = n,
            globals = packing.globals.len(),
            width = columns.width,
            r1cs_constraints = n_r1cs,
            aux_constraints = constraints.len() - n_r1cs,
            "Packed layout."
        );
        Ok(Self {
            register_count: columns.register_count(),
            packing,
            transition_constraints: constraints,
            static_boundary,
            wire_boundary,
        })
    }

    pub fn packing(&self) -> &Packing {
        &self.packing
    }
}

/// Booleanity of every selector, and selector `i` vanishing off row `i`, on both rows.
fn selector_constraints(
    field: &PrimeField,
    vars: &RegisterVars,
    columns: &Columns,
    n_rows: usize,
) -> Vec<Polynomial> {
    let cycle = vars.cycle_poly(field);
    let mut res = Vec::with_capacity(4 * n_rows);
    for i in 0..n_rows {
        let index = Polynomial::constant(field, field.from_u64(i as u64));
        let s = vars.current_poly(field, columns.selector(i));
        let s_next = vars.next_poly(field, columns.selector(i));
        res.push(s.clone() * s.clone() - s.clone());
        res.push((cycle.clone() - index.clone()) * s);
        res.push((cycle.clone() + Polynomial::one(field) - index) * s_next.clone());
        res.push(s_next.clone() * s_next.clone() - s_next);
    }
    res
}

/// Register indices of the three column blocks.
struct Columns {
    n_selectors: usize,
    n_globals: usize,
    width: usize,
}

impl Columns {
    fn new(packing: &Packing) -> Self {
        Self {
            n_selectors: packing.n_rows(),
            n_globals: packing.globals.len(),
            width: packing.payload_width(),
        }
    }

    fn register_count(&self) -> usize {
        self.n_selectors + self.n_globals + self.width
    }

    fn selector(&self, row: usize) -> usize {
        row
    }

    fn global(&self, k: usize) -> usize {
        self.n_selectors + k
    }

    fn payload(&self, j: usize) -> usize {
        self.n_selectors + self.n_globals + j
    }
}

impl AirLayout for PackedLayout {
    fn strategy(&self) -> Strategy {
        Strategy::Packed
    }

    fn register_count(&self) -> usize {
        self.register_count
    }

    fn trace_len(&self) -> usize {
        self.packing.n_rows()
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
        let columns = Columns::new(&self.packing);
        let globals = self
            .packing
            .globals
            .iter()
            .map(|wire| witness[*wire].clone())
            .collect::<Vec<_>>();
        self.packing
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut values = vec![FieldElement::zero(); self.register_count];
                values[columns.selector(i)] = FieldElement::one();
                values[columns.global(0)..columns.payload(0)].clone_from_slice(&globals);
                for (j, wire) in row.iter().enumerate() {
                    values[columns.payload(j)] = witness[*wire].clone();
                }
                values
            })
            .collect()
    }
}
