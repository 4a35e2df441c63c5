//! What a classifier can see.

use cfr_ir::{ArchDescriptor, BlockIndex, MemoryImage, RegState, Stmt, Value};
use rustc_hash::FxHashSet;

use crate::domain::{AbstractState, BranchFeasibility, Definitions};
use crate::parsed::{ParsedBlock, ParsedTerminator};

/// Architecture-specific call and return recognition.
pub trait Recognizers {
    /// Recognize a call; returns the statements to keep and the return address.
    fn identify_call(
        &self,
        mem: &MemoryImage,
        stmts: &[Stmt],
        regs: &RegState,
    ) -> Option<(Vec<Stmt>, u64)>;

    /// Recognize a return; returns the statements to keep.
    fn identify_return(
        &self,
        stmts: &[Stmt],
        regs: &RegState,
        abs: &dyn AbstractState,
    ) -> Option<Vec<Stmt>>;
}

/// Per-function facts shared by every block classified in it.
pub struct ClassifyEnv<'a> {
    pub arch: &'a ArchDescriptor,
    pub mem: &'a MemoryImage,
    pub defs: &'a Definitions,
    pub recognizers: &'a dyn Recognizers,
    pub abs: &'a dyn AbstractState,
    pub bounds: &'a dyn BranchFeasibility,
    /// Entries of functions already known.
    pub known_functions: &'a FxHashSet<u64>,
}

/// One block ending in `FetchAndExecute`, ready for classification.
pub struct ClassifyContext<'a> {
    pub env: &'a ClassifyEnv<'a>,
    pub index: BlockIndex,
    pub block_addr: u64,
    pub stmts: &'a [Stmt],
    pub regs: &'a RegState,
}

impl ClassifyContext<'_> {
    /// A parsed block for this context with the given statements and terminator.
    pub const fn parsed(&self, stmts: Vec<Stmt>, term: ParsedTerminator) -> ParsedBlock {
        ParsedBlock::new(self.index, self.block_addr, stmts, term)
    }

    /// Final instruction pointer.
    pub fn ip(&self) -> Option<&Value> {
        self.regs.get(self.env.arch.ip)
    }

    /// Concrete address of a literal or segment-relative value.
    pub fn address_of(&self, value: &Value) -> Option<u64> {
        value.resolve_address(self.env.mem)
    }

    /// Concrete address of `value` if it lies in executable memory.
    pub fn executable_address(&self, value: &Value) -> Option<u64> {
        self.address_of(value)
            .filter(|addr| self.env.mem.is_executable(*addr))
    }

    /// Check if the stack pointer is back at its entry value.
    pub fn stack_at_entry(&self) -> bool {
        let sp = self.env.arch.sp;
        self.regs.get(sp).is_some_and(|v| {
            matches!(v, Value::Initial { reg, .. } if *reg == sp)
                || self
                    .env
                    .defs
                    .linear(v)
                    .is_some_and(|lin| lin.base == Some(sp) && lin.offset == 0)
        })
    }
}
