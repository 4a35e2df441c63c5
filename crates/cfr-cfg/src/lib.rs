//! Block classification for control-flow recovery.
//!
//! Given a finished block and its final register state, decide how control
//! leaves it: fall through, call, return, conditionally return, tail call
//! or jump indirectly. Classifiers run in priority order and the first one
//! that recognizes the block wins; anything unrecognized becomes an
//! indirect jump.

mod classifier;
mod conditional;
mod context;
mod domain;
mod parsed;
mod standard;
#[cfg(test)]
mod test_support;

pub use classifier::*;
pub use conditional::*;
pub use context::*;
pub use domain::*;
pub use parsed::*;
pub use standard::*;

use thiserror::Error;

/// Classification errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("successor 0x{addr:x} is not executable")]
    NotExecutable { addr: u64 },
    #[error("conditional return with infeasible branch ({feasibility:?})")]
    InfeasibleBranch { feasibility: Feasibility },
    #[error("no classifier matched ({tried} tried)")]
    NoClassifierMatched { tried: usize },
}

impl ClassifyError {
    /// Check if this error indicates broken modeling rather than an
    /// unclassifiable block.
    pub const fn is_invariant_violation(&self) -> bool {
        !matches!(self, Self::NoClassifierMatched { .. })
    }
}

pub type Result<T> = std::result::Result<T, ClassifyError>;
