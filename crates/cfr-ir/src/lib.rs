//! Intermediate representation for control-flow recovery.
//!
//! This crate provides architecture-independent values, expressions,
//! statements and blocks, plus the [`Generator`] that instruction semantics
//! drive to build blocks. Architecture knowledge enters only through an
//! [`ArchDescriptor`] value carried alongside the data.

mod arch;
mod block;
mod demand;
mod expr;
mod fold;
mod generator;
mod regs;
mod stmt;
mod terminator;
mod value;

pub use arch::*;
pub use block::*;
pub use demand::*;
pub use expr::*;
pub use fold::*;
pub use generator::*;
pub use regs::*;
pub use stmt::*;
pub use terminator::*;
pub use value::*;

pub use cfr_mem::{Endianness, MemoryImage};

use thiserror::Error;

/// Broken contracts of the IR and generator. These indicate a modeling bug,
/// not bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("block already terminated")]
    AlreadyTerminated,
    #[error("register {0} out of range")]
    UnknownRegister(Reg),
    #[error("register {reg} has type {expected}, got {actual}")]
    RegisterType {
        reg: Reg,
        expected: Type,
        actual: Type,
    },
    #[error("ill-typed {op}: {detail}")]
    IllTyped { op: &'static str, detail: String },
    #[error("block {0} emitted twice")]
    DuplicateBlock(BlockIndex),
    #[error("block {0} was never allocated")]
    UnallocatedBlock(BlockIndex),
    #[error("block {index} finished after block {after}")]
    OutOfOrderBlock { index: BlockIndex, after: BlockIndex },
}

/// IR construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("decode failure at 0x{addr:x}: {reason}")]
    DecodeFailure { addr: u64, reason: String },
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),
}

impl IrError {
    /// Create a decode failure.
    pub fn decode(addr: u64, reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            addr,
            reason: reason.into(),
        }
    }

    /// Check if this error aborts the whole discovery unit.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, IrError>;
