//! Circuit builders shared by the module tests.
use num_bigint::BigUint;

use crate::core::fields::PrimeField;
use crate::r1cs::{Constraint, LinearCombination, R1csDocument};

pub fn lc(field: &PrimeField, terms: &[(usize, i64)]) -> LinearCombination {
    terms
        .iter()
        .map(|(wire, coef)| (*wire, field.from_i64(*coef)))
        .collect()
}

pub fn constraint(
    field: &PrimeField,
    a: &[(usize, i64)],
    b: &[(usize, i64)],
    c: &[(usize, i64)],
) -> Constraint {
    Constraint::new(lc(field, a), lc(field, b), lc(field, c))
}

/// Byte width the container uses for `prime`: whole 64-bit words.
pub fn field_size(prime: &BigUint) -> u32 {
    (prime.bits().div_ceil(64) * 8) as u32
}

pub fn document(
    field: &PrimeField,
    n_wires: u32,
    [n_outputs, n_pub_inputs, n_prv_inputs]: [u32; 3],
    constraints: Vec<Constraint>,
) -> R1csDocument {
    R1csDocument {
        field_size: field_size(field.modulus()),
        prime: field.modulus().clone(),
        n_wires,
        n_outputs,
        n_pub_inputs,
        n_prv_inputs,
        n_labels: n_wires as i64,
        constraints,
    }
}

/// `n >= 2` constraints over public `a` (wire 2) and private `b` (wire 3):
/// `t_0 = a * b`, `t_i = t_{i-1} * b` and finally `out = t_{n-2}` (wire 1).
/// The internal wires `t_i` are wires `4..n + 3`, so `out = a * b^(n-1)`.
pub fn product_chain(field: &PrimeField, n: usize) -> R1csDocument {
    assert!(n >= 2, "a product chain needs at least two constraints");
    let (a, b) = (2, 3);
    let t = |i: usize| 4 + i;
    let mut constraints = vec![constraint(field, &[(a, 1)], &[(b, 1)], &[(t(0), 1)])];
    for i in 1..n - 1 {
        constraints.push(constraint(field, &[(t(i - 1), 1)], &[(b, 1)], &[(t(i), 1)]));
    }
    constraints.push(constraint(field, &[(t(n - 2), 1)], &[(0, 1)], &[(1, 1)]));
    document(field, n as u32 + 3, [1, 1, 1], constraints)
}

/// `1·x * 1 = value` with `x` the only public input.
pub fn scenario_eq_constant(field: &PrimeField, value: i64) -> R1csDocument {
    document(
        field,
        2,
        [0, 1, 0],
        vec![constraint(field, &[(1, 1)], &[(0, 1)], &[(0, value)])],
    )
}

/// `x * (x + 1) = 0` with `x` internal.
pub fn scenario_self_multiplying(field: &PrimeField) -> R1csDocument {
    document(
        field,
        2,
        [0, 0, 0],
        vec![constraint(field, &[(1, 1)], &[(1, 1), (0, 1)], &[])],
    )
}

/// `(x + 1) * (x + 2) = 0` with `x` internal.
pub fn scenario_quadratic(field: &PrimeField) -> R1csDocument {
    document(
        field,
        2,
        [0, 0, 0],
        vec![constraint(field, &[(1, 1), (0, 1)], &[(1, 1), (0, 2)], &[])],
    )
}

/// `x * y = 1` with both wires internal: never has a single unknown.
pub fn scenario_two_unknowns(field: &PrimeField) -> R1csDocument {
    document(
        field,
        3,
        [0, 0, 0],
        vec![constraint(field, &[(1, 1)], &[(2, 1)], &[(0, 1)])],
    )
}

/// Public `v` (wire 1) split into `n_bits` boolean wires `2..2 + n_bits`:
/// `b_i * (b_i - 1) = 0` for every bit and `sum(2^i b_i) * 1 = v`.
pub fn bit_decomposition(field: &PrimeField, n_bits: usize) -> R1csDocument {
    let bit = |i: usize| 2 + i;
    let mut constraints = (0..n_bits)
        .map(|i| constraint(field, &[(bit(i), 1)], &[(bit(i), 1), (0, -1)], &[]))
        .collect::<Vec<_>>();
    let sum = (0..n_bits).map(|i| (bit(i), 1i64 << i)).collect::<Vec<_>>();
    constraints.push(constraint(field, &sum, &[(0, 1)], &[(1, 1)]));
    document(field, 2 + n_bits as u32, [0, 1, 0], constraints)
}
