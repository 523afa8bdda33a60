//! Parse R1CS circuits, solve their witnesses and compile both into an AIR for a STARK prover.
use num_bigint::BigUint;
use thiserror::Error;
use tracing::instrument;

pub mod air;
pub mod backend;
pub mod core;
pub mod r1cs;
#[cfg(test)]
mod test_utils;
pub mod witness;

use crate::air::{AirCompiler, AirConfig, AirProgram, CompileError, TraceError};
use crate::backend::BackendError;
use crate::core::fields::FieldError;
use crate::r1cs::ParseError;
use crate::witness::{SolverError, Witness, WitnessSolver};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Field(#[from] FieldError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parses an R1CS container and compiles it for `inputs`.
///
/// The prime is checked against `config` before anything is solved. With `witness_override`
/// the solver is skipped and the given witness is checked against the circuit instead.
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn compile_r1cs(
    bytes: &[u8],
    inputs: &[BigUint],
    witness_override: Option<Witness>,
    config: &AirConfig,
) -> Result<AirProgram> {
    let doc = r1cs::parse(bytes)?;
    let compiler = AirCompiler::new(&doc, config)?;
    let witness = match witness_override {
        Some(witness) => {
            witness.check(&doc)?;
            witness
        }
        None => WitnessSolver::new(&doc).solve(inputs)?,
    };
    Ok(compiler.compile(&witness)?)
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::{compile_r1cs, Error};
    use crate::air::{AirConfig, CompileError, Strategy};
    use crate::backend::{ProverInput, StarkBackend, TraceCheckBackend};
    use crate::core::fields::PrimeField;
    use crate::r1cs::writer::{encode, encode_constraints, encode_container, encode_header};
    use crate::r1cs::{ParseError, UnsupportedFeatureError};
    use crate::test_utils::{product_chain, scenario_eq_constant, scenario_self_multiplying};
    use crate::witness::{SolverError, Witness};

    #[test_log::test]
    fn test_eq_constant_proves() {
        let field = PrimeField::goldilocks();
        let bytes = encode(&scenario_eq_constant(&field, 12));
        let config = AirConfig::default();

        let program = compile_r1cs(&bytes, &[BigUint::from(12u32)], None, &config).unwrap();
        let input = ProverInput::new(&program, config.limb_bits());
        let proof = TraceCheckBackend.prove(&input).unwrap();

        assert_eq!(program.trace[0][1], field.from_u64(12));
        assert_eq!(TraceCheckBackend.verify(&proof, &input.statement), Ok(()));
        assert_eq!(
            compile_r1cs(&bytes, &[BigUint::from(13u32)], None, &config),
            Err(Error::Solver(SolverError::InvalidInput { constraint: 0 }))
        );
    }

    #[test]
    fn test_self_multiplying_proves() {
        let field = PrimeField::goldilocks();
        let bytes = encode(&scenario_self_multiplying(&field));

        let program = compile_r1cs(&bytes, &[], None, &AirConfig::default()).unwrap();

        assert_eq!(program.trace[0][1], field.from_i64(-1));
        program.check().unwrap();
    }

    #[test]
    fn test_custom_gates_fail_early() {
        let doc = scenario_eq_constant(&PrimeField::goldilocks(), 12);
        let bytes = encode_container(&[
            (1, encode_header(&doc)),
            (4, vec![0; 8]),
            (2, encode_constraints(&doc)),
        ]);

        assert_eq!(
            compile_r1cs(&bytes, &[BigUint::from(12u32)], None, &AirConfig::default()),
            Err(Error::Parse(ParseError::Unsupported(
                UnsupportedFeatureError::CustomGates { section_type: 4 }
            )))
        );
    }

    #[test]
    fn test_prime_checked_before_solving() {
        let bytes = encode(&product_chain(&PrimeField::bn254(), 3));

        // The input count is also wrong, but the prime is checked first.
        assert!(matches!(
            compile_r1cs(&bytes, &[], None, &AirConfig::default()),
            Err(Error::Compile(CompileError::PrimeMismatch { .. }))
        ));
        let config = AirConfig::new(PrimeField::bn254().modulus().clone(), 64);
        let inputs = [BigUint::from(2u32), BigUint::from(9u32)];
        compile_r1cs(&bytes, &inputs, None, &config)
            .unwrap()
            .check()
            .unwrap();
    }

    #[test]
    fn test_witness_override() {
        let field = PrimeField::goldilocks();
        let doc = product_chain(&field, 3);
        let bytes = encode(&doc);
        let config = AirConfig::default().with_strategy(Strategy::Packed);
        // out = 2 * 3^2.
        let values = [1u32, 18, 2, 3, 6, 18].map(BigUint::from);

        let witness = Witness::from_values(&field, &values);
        let program = compile_r1cs(&bytes, &[], Some(witness.clone()), &config).unwrap();
        program.check().unwrap();

        let mut wrong = values.clone();
        wrong[1] = BigUint::from(19u32);
        assert_eq!(
            compile_r1cs(&bytes, &[], Some(Witness::from_values(&field, &wrong)), &config),
            Err(Error::Solver(SolverError::InvalidInput { constraint: 2 }))
        );
        // Wire 0 doubles along with every other wire.
        let scaled = values.map(|v| v * 2u32);
        assert!(matches!(
            compile_r1cs(&bytes, &[], Some(Witness::from_values(&field, &scaled)), &config),
            Err(Error::Solver(SolverError::ConstantWire { .. }))
        ));
    }
}
