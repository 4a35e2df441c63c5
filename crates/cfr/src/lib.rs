//! CFR - control-flow recovery from machine code.
//!
//! Disassembles functions through an architecture's instruction semantics,
//! classifies how control leaves every block and follows the successors
//! until each function's reachable code is covered.
//!
//! # Example
//!
//! ```ignore
//! use cfr::{ExploreConfig, MemoryImage, explore_functions, riscv::RiscV};
//!
//! let arch = RiscV::new(MySemantics);
//! let results = explore_functions(&arch, &image, &[0x1000], &ExploreConfig::default())?;
//! ```

// Re-export from sub-crates
pub use cfr_arch::{
    ArchHooks, Architecture, DisassembleConfig, DisassembleOutput, InstructionSemantics,
    RewriteHook, SeedHook, UnitState, adjust_stack, arm, disassemble, entry_state, ip_is_return,
    link_register_call, next_instruction_addr, ppc, riscv, stack_call, x86_64,
};
pub use cfr_cfg::{
    AbsValue, AbstractState, BlockClassifier, BranchFeasibility, ClassifierChain, ClassifyContext,
    ClassifyEnv, ClassifyError, ConditionalReturnClassifier, ConservativeBounds, Definitions,
    Feasibility, ParsedBlock, ParsedTerminator, PrimEval, Recognizers, SentinelDomain, StackSlot,
    TerminatorKind, classify_block,
};
pub use cfr_ir::{
    App, ArchDescriptor, ArchPrim, ArchStmt, ArchTermStmt, AssignId, AssignIdSource, AssignRhs,
    Assignment, BinaryOp, Block, BlockIndex, BlockSeq, DemandContext, Expr, Generator, IrError,
    Reg, RegInfo, RegState, Stmt, Terminator, TernaryOp, Type, Value, Violation,
    prune_dead_assignments,
};
pub use cfr_mem::{Endianness, MemoryError, MemoryImage, PF_R, PF_W, PF_X, Segment};

mod error;
mod explore;
pub mod metrics;

pub use error::*;
pub use explore::*;
