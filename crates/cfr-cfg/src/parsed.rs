//! Classified blocks.

use cfr_ir::{ArchTermStmt, BlockIndex, RegState, Stmt, Value};

/// How control leaves a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminatorKind {
    Fallthrough,
    Branch,
    Call,
    Return,
    ConditionalReturn,
    TailCall,
    IndirectJump,
    Arch,
    TranslateError,
    ClassificationFailed,
}

impl TerminatorKind {
    /// Metric label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fallthrough => "fallthrough",
            Self::Branch => "branch",
            Self::Call => "call",
            Self::Return => "return",
            Self::ConditionalReturn => "conditional_return",
            Self::TailCall => "tail_call",
            Self::IndirectJump => "indirect_jump",
            Self::Arch => "arch",
            Self::TranslateError => "translate_error",
            Self::ClassificationFailed => "classification_failed",
        }
    }
}

/// Classified terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedTerminator {
    /// Call; control resumes at `return_addr` when known.
    Call {
        regs: RegState,
        return_addr: Option<u64>,
    },
    /// Jump to the entry of a known function with the caller's frame.
    TailCall { regs: RegState },
    /// Jump to a single known address.
    Jump { regs: RegState, target: u64 },
    /// Two-way branch to known addresses.
    Branch {
        regs: RegState,
        cond: Value,
        true_target: u64,
        false_target: u64,
    },
    Return { regs: RegState },
    /// Return when `cond == returns_when`, otherwise continue at `fallthrough`.
    ConditionalReturn {
        regs: RegState,
        cond: Value,
        returns_when: bool,
        fallthrough: u64,
    },
    /// Jump to an address not known statically.
    IndirectJump { regs: RegState },
    /// Branch between blocks produced by a single instruction.
    IntraBranch {
        cond: Value,
        on_true: BlockIndex,
        on_false: BlockIndex,
    },
    TranslateError {
        regs: RegState,
        addr: u64,
        reason: String,
    },
    Arch { stmt: ArchTermStmt, regs: RegState },
    ClassifyFailure { regs: RegState, reason: String },
}

impl ParsedTerminator {
    pub const fn kind(&self) -> TerminatorKind {
        match self {
            Self::Call { .. } => TerminatorKind::Call,
            Self::TailCall { .. } => TerminatorKind::TailCall,
            Self::Jump { .. } => TerminatorKind::Fallthrough,
            Self::Branch { .. } | Self::IntraBranch { .. } => TerminatorKind::Branch,
            Self::Return { .. } => TerminatorKind::Return,
            Self::ConditionalReturn { .. } => TerminatorKind::ConditionalReturn,
            Self::IndirectJump { .. } => TerminatorKind::IndirectJump,
            Self::TranslateError { .. } => TerminatorKind::TranslateError,
            Self::Arch { .. } => TerminatorKind::Arch,
            Self::ClassifyFailure { .. } => TerminatorKind::ClassificationFailed,
        }
    }

    /// Final register state, if the terminator carries one.
    pub const fn regs(&self) -> Option<&RegState> {
        match self {
            Self::Call { regs, .. }
            | Self::TailCall { regs }
            | Self::Jump { regs, .. }
            | Self::Branch { regs, .. }
            | Self::Return { regs }
            | Self::ConditionalReturn { regs, .. }
            | Self::IndirectJump { regs }
            | Self::TranslateError { regs, .. }
            | Self::Arch { regs, .. }
            | Self::ClassifyFailure { regs, .. } => Some(regs),
            Self::IntraBranch { .. } => None,
        }
    }
}

/// A block after classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedBlock {
    pub index: BlockIndex,
    pub addr: u64,
    pub stmts: Vec<Stmt>,
    pub term: ParsedTerminator,
    /// Intra-function successor addresses.
    pub successors: Vec<u64>,
    /// Newly discovered function entries.
    pub new_functions: Vec<u64>,
}

impl ParsedBlock {
    /// A block with no successors and no discovered functions.
    pub const fn new(index: BlockIndex, addr: u64, stmts: Vec<Stmt>, term: ParsedTerminator) -> Self {
        Self {
            index,
            addr,
            stmts,
            term,
            successors: Vec::new(),
            new_functions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_successors(mut self, successors: Vec<u64>) -> Self {
        self.successors = successors;
        self
    }

    #[must_use]
    pub fn with_new_functions(mut self, entries: Vec<u64>) -> Self {
        self.new_functions = entries;
        self
    }

    pub const fn kind(&self) -> TerminatorKind {
        self.term.kind()
    }
}
