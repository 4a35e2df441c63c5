//! Block terminators produced by the generator.
//!
//! These are the raw, unclassified exits. Deciding whether a
//! `FetchAndExecute` is a call, return or jump is the classifier's job.

use std::fmt;

use crate::block::BlockIndex;
use crate::regs::RegState;
use crate::value::Value;

/// Architecture-specific terminator statement (e.g. a trap or syscall).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchTermStmt {
    pub name: String,
    pub args: Vec<Value>,
}

impl ArchTermStmt {
    pub fn new(name: &str, args: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// Block terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    /// Continue at whatever the instruction pointer holds.
    FetchAndExecute(RegState),
    /// Symbolic branch to two blocks of the same sequence.
    Branch {
        cond: Value,
        on_true: BlockIndex,
        on_false: BlockIndex,
    },
    /// Decoding failed at `addr`; `regs` is the state before the failing instruction.
    TranslateError {
        regs: RegState,
        addr: u64,
        reason: String,
    },
    /// Architecture-specific terminator.
    Arch { stmt: ArchTermStmt, regs: RegState },
}

impl Terminator {
    /// Final register state, if this terminator carries one.
    pub const fn regs(&self) -> Option<&RegState> {
        match self {
            Self::FetchAndExecute(regs)
            | Self::TranslateError { regs, .. }
            | Self::Arch { regs, .. } => Some(regs),
            Self::Branch { .. } => None,
        }
    }

    /// Short kind name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FetchAndExecute(_) => "fetch_and_execute",
            Self::Branch { .. } => "branch",
            Self::TranslateError { .. } => "translate_error",
            Self::Arch { .. } => "arch",
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchAndExecute(_) => write!(f, "fetch_and_execute"),
            Self::Branch {
                cond,
                on_true,
                on_false,
            } => write!(f, "branch {cond} ? {on_true} : {on_false}"),
            Self::TranslateError { addr, reason, .. } => {
                write!(f, "translate_error 0x{addr:x}: {reason}")
            }
            Self::Arch { stmt, .. } => write!(f, "arch {}", stmt.name),
        }
    }
}
