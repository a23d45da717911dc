pub mod builder;
pub mod config;
pub mod fixer;
pub mod lower;
#[cfg(test)]
mod sim;
pub mod slot;
pub mod stream;
pub mod value;

use thiserror::Error;

pub use builder::ScriptBuilder;
pub use config::{Capacities, ConfigError};
pub use fixer::{FixOutput, FixWarning};
pub use lower::{AssignOp, BinaryOp, LowerError, Lowerer, PowStrategy};
pub use slot::{DeclaredType, Slot};
pub use stream::{Instruction, StructuralError, Tag};
pub use value::{CompareOp, Condition, Literal, Operand};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lower(#[from] LowerError),
    #[error(transparent)]
    Structure(#[from] StructuralError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Entry point for host code: runs `script` against a fresh builder and returns the
/// block-limit-fixed instruction list.
pub fn compile(
    capacities: Capacities,
    script: impl FnOnce(&mut ScriptBuilder) -> Result<(), CompileError>,
) -> Result<FixOutput, CompileError> {
    let mut builder = ScriptBuilder::new().with_capacities(capacities);
    script(&mut builder)?;
    builder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Simulator;

    fn run(output: &FixOutput) -> Simulator {
        let mut sim = Simulator::default();
        sim.run(&output.instructions);
        sim
    }

    #[test]
    fn compiles_nested_arithmetic() {
        let output = compile(Capacities::default(), |script| {
            let a = script.player("a")?;
            let x = script.player("x")?;
            script.lower().assign(&a, &Operand::from(5))?;
            let mut lower = script.lower();
            let left = lower.add(&Operand::from(&a), &Operand::from(3))?;
            let right = lower.sub(&Operand::from(&a), &Operand::from(1))?;
            let product = lower.mul(&left, &right)?;
            lower.assign(&x, &product)?;
            Ok(())
        })
        .expect("compile");
        assert_eq!(run(&output).get("stat x"), 32);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn pow_and_modulo_evaluate_correctly() {
        let output = compile(Capacities::default(), |script| {
            let a = script.player("a")?;
            let b = script.player("b")?;
            let cube = script.player("cube")?;
            let rem = script.player("rem")?;
            script.lower().assign(&a, &Operand::from(2))?;
            script.lower().assign(&b, &Operand::from(-7))?;
            let power = script.lower().pow(&Operand::from(&a), 13)?;
            script.lower().assign(&cube, &power)?;
            let modulo = script.lower().modulo(&Operand::from(&b), &Operand::from(3))?;
            script.lower().assign(&rem, &modulo)?;
            Ok(())
        })
        .expect("compile");
        let sim = run(&output);
        assert_eq!(sim.get("stat cube"), 8192);
        assert_eq!(sim.get("stat rem"), 2);
    }

    #[test]
    fn long_scripts_stay_equivalent_after_fixing() {
        let output = compile(Capacities::default(), |script| {
            let total = script.global("total")?;
            for _ in 0..25 {
                script
                    .lower()
                    .assign_op(&total, AssignOp::Add, &Operand::from(2))?;
            }
            Ok(())
        })
        .expect("compile");
        assert_eq!(output.fillers, 2);
        assert_eq!(run(&output).get("globalstat total"), 50);
    }

    #[test]
    fn failing_statement_aborts_compilation() {
        let result = compile(Capacities::default(), |script| {
            let name = script.declare(Slot::player("name").typed(DeclaredType::String))?;
            script.lower().pow(&Operand::from(&name), 2)?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(CompileError::Lower(LowerError::TypeIncompatible { .. }))
        ));
    }

    #[test]
    fn structural_errors_surface_through_compile() {
        let result = compile(Capacities::default(), |script| {
            script.end()?;
            Ok(())
        });
        let err = result.expect_err("unmatched end");
        assert!(err.to_string().contains("never opened"));
    }
}
