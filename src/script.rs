//! Adapter boundary to the block program (puzzle/solution) evaluator. The
//! real evaluator is out of scope (spec non-goals); this crate only defines
//! the contract the validator calls through and two test doubles.

use crate::types::{Coin, RequiredSignature};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program cost {cost} exceeds the limit {limit}")]
    CostExceeded { cost: u64, limit: u64 },

    #[error("program evaluation failed: {0}")]
    Evaluation(String),
}

/// What a successful evaluation reports back to the validator: the coins it
/// creates and consumes, the signatures it requires, and the cost it spent.
#[derive(Clone, Debug, Default)]
pub struct ProgramOutput {
    pub additions: Vec<Coin>,
    pub removals: Vec<Coin>,
    pub agg_sig_conditions: Vec<RequiredSignature>,
    pub cost: u64,
}

/// The evaluator boundary. Implementations run an opaque `program` against
/// `args` (solutions) and a `cost_limit`; everything downstream of this
/// trait (the validator, the mempool) only ever sees `ProgramOutput`.
pub trait BlockProgramRunner: Send + Sync {
    fn run_block_program(
        &self,
        program: &[u8],
        args: &[u8],
        cost_limit: u64,
    ) -> Result<ProgramOutput, ProgramError>;
}

/// Test double: every program evaluation fails. Useful for asserting a
/// validator path never reaches the evaluator.
pub struct RejectingProgramRunner;

impl BlockProgramRunner for RejectingProgramRunner {
    fn run_block_program(
        &self,
        _program: &[u8],
        _args: &[u8],
        _cost_limit: u64,
    ) -> Result<ProgramOutput, ProgramError> {
        Err(ProgramError::Evaluation(
            "RejectingProgramRunner refuses all programs".to_string(),
        ))
    }
}

/// Test double: charges a fixed cost per byte of `program`, producing no
/// coin changes. Useful for validator tests that only exercise the cost
/// check rather than real coin bookkeeping.
pub struct CostOnlyProgramRunner {
    pub cost_per_byte: u64,
}

impl BlockProgramRunner for CostOnlyProgramRunner {
    fn run_block_program(
        &self,
        program: &[u8],
        _args: &[u8],
        cost_limit: u64,
    ) -> Result<ProgramOutput, ProgramError> {
        let cost = program.len() as u64 * self.cost_per_byte;
        if cost > cost_limit {
            return Err(ProgramError::CostExceeded {
                cost,
                limit: cost_limit,
            });
        }
        Ok(ProgramOutput {
            cost,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_only_runner_charges_per_byte() {
        let runner = CostOnlyProgramRunner { cost_per_byte: 10 };
        let out = runner.run_block_program(&[0u8; 5], &[], 1000).unwrap();
        assert_eq!(out.cost, 50);
    }

    #[test]
    fn cost_only_runner_rejects_over_limit() {
        let runner = CostOnlyProgramRunner { cost_per_byte: 10 };
        let err = runner.run_block_program(&[0u8; 5], &[], 10).unwrap_err();
        assert!(matches!(err, ProgramError::CostExceeded { .. }));
    }

    #[test]
    fn rejecting_runner_always_errors() {
        let runner = RejectingProgramRunner;
        assert!(runner.run_block_program(&[], &[], 100).is_err());
    }
}
