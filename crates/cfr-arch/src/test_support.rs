//! Fixtures shared by the target tests.

use cfr_cfg::{
    ClassifyEnv, ConservativeBounds, Definitions, ParsedBlock, SentinelDomain, classify_block,
};
use cfr_ir::{
    AssignId, AssignRhs, Assignment, Block, BlockIndex, Endianness, Generator, MemoryImage,
    RegState, Stmt, Terminator, Type, Value,
};
use cfr_mem::{PF_R, PF_W, PF_X, Segment};
use rustc_hash::FxHashSet;

use crate::{Architecture, InstructionSemantics};

/// Semantics that decode nothing.
pub struct NoSemantics;

impl InstructionSemantics for NoSemantics {
    type Instr = ();

    fn decode(&self, _bytes: &[u8], _addr: u64) -> Option<(Self::Instr, u8)> {
        None
    }

    fn translate(
        &self,
        _generator: &mut Generator<'_>,
        _instr: &Self::Instr,
        _addr: u64,
        _size: u8,
    ) -> cfr_ir::Result<()> {
        Ok(())
    }
}

/// Code at 0x1000..0x1100, data at 0x2000..0x2100.
pub fn mem(endianness: Endianness) -> MemoryImage {
    MemoryImage::new(endianness)
        .with_segment(Segment::new(0x1000, vec![0; 0x100], PF_R | PF_X))
        .unwrap()
        .with_segment(Segment::new(0x2000, vec![0; 0x100], PF_R | PF_W))
        .unwrap()
}

pub fn start(addr: u64, size: u8) -> Stmt {
    Stmt::InstructionStart { addr, size }
}

/// `r{id} := rhs`.
pub fn assign(id: u64, rhs: AssignRhs, ty: Type) -> (Stmt, Value) {
    let assignment = Assignment {
        id: AssignId(id),
        rhs,
        ty,
    };
    let value = assignment.value();
    (Stmt::Assign(assignment), value)
}

/// Classify one block at 0x1000 with the target's own chain, recognizers
/// and hooks.
pub fn classify<A: Architecture>(
    arch: &A,
    stmts: Vec<Stmt>,
    regs: RegState,
) -> cfr_cfg::Result<ParsedBlock> {
    let desc = arch.descriptor();
    let mem = mem(desc.endianness);
    let defs = Definitions::from_stmts(&stmts);
    let hooks = arch.hooks();
    let seeds = hooks
        .seed_abs_state
        .map(|seed| seed(desc))
        .unwrap_or_default();
    let abs = SentinelDomain::new(&defs, &seeds, desc.addr_width, hooks.eval_arch_prim);
    let known = FxHashSet::default();
    let env = ClassifyEnv {
        arch: desc,
        mem: &mem,
        defs: &defs,
        recognizers: arch,
        abs: &abs,
        bounds: &ConservativeBounds,
        known_functions: &known,
    };
    let block = Block {
        index: BlockIndex(0),
        addr: 0x1000,
        stmts,
        term: Terminator::FetchAndExecute(regs),
    };
    classify_block(&env, &arch.classifiers(), block)
}
