//! Architecture descriptions for control-flow recovery.
//!
//! Each target implements [`Architecture`] once: a fixed descriptor, the
//! entry register state, call and return recognizers, its classifier chain
//! and optional hooks. Instruction semantics are supplied separately through
//! [`InstructionSemantics`]; this crate never parses instruction bytes.

mod disasm;
mod recognize;

pub mod arm;
pub mod ppc;
pub mod riscv;
pub mod x86_64;
#[cfg(test)]
mod test_support;

pub use disasm::*;
pub use recognize::*;

use cfr_cfg::{ClassifierChain, Definitions, ParsedBlock, PrimEval, Recognizers, StackSlot};
use cfr_ir::{App, ArchDescriptor, BinaryOp, DemandContext, MemoryImage, Reg, RegState, Value};
use tracing::warn;

/// Decode and translate single instructions.
pub trait InstructionSemantics: Send + Sync {
    /// Decoded instruction.
    type Instr;

    /// Decode the instruction starting at `bytes[0]`, returning it with its
    /// size. `None` if the bytes are not a valid instruction.
    fn decode(&self, bytes: &[u8], addr: u64) -> Option<(Self::Instr, u8)>;

    /// Emit the instruction's effects. Must leave the instruction pointer
    /// at the next instruction to execute.
    fn translate(
        &self,
        generator: &mut cfr_ir::Generator<'_>,
        instr: &Self::Instr,
        addr: u64,
        size: u8,
    ) -> cfr_ir::Result<()>;
}

/// Seed the entry return address into memory slots.
pub type SeedHook = fn(&ArchDescriptor) -> Vec<StackSlot>;

/// Post-process a classified block.
pub type RewriteHook = fn(&ArchDescriptor, ParsedBlock) -> ParsedBlock;

/// Optional per-architecture hooks. `None` means the architecture does not
/// support the hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchHooks {
    pub seed_abs_state: Option<SeedHook>,
    pub eval_arch_prim: Option<PrimEval>,
    pub rewrite_block: Option<RewriteHook>,
}

/// A target architecture configuration.
pub trait Architecture: Recognizers + Send + Sync {
    type Semantics: InstructionSemantics;

    fn descriptor(&self) -> &ArchDescriptor;

    fn semantics(&self) -> &Self::Semantics;

    /// Registers at function entry, with the return address seeded.
    fn initial_register_state(&self, entry: u64) -> RegState;

    /// Decode instructions from `addr` until control leaves the block.
    fn disassemble(
        &self,
        mem: &MemoryImage,
        unit: &mut UnitState,
        addr: u64,
        regs: RegState,
        config: &DisassembleConfig,
    ) -> cfr_ir::Result<DisassembleOutput> {
        disassemble(
            self.descriptor(),
            self.semantics(),
            mem,
            unit,
            addr,
            regs,
            config,
        )
    }

    fn demand_context(&self) -> DemandContext {
        DemandContext::default()
    }

    fn classifiers(&self) -> ClassifierChain {
        ClassifierChain::standard()
    }

    fn hooks(&self) -> ArchHooks;

    /// Registers observed at `return_addr` after a call returns.
    ///
    /// The instruction pointer is the return address, caller-saved registers
    /// are clobbered and the stack pointer is adjusted by the descriptor's
    /// `call_stack_adjust`.
    fn post_call_regs(&self, defs: &Definitions, regs: &RegState, return_addr: u64) -> RegState {
        let arch = self.descriptor();
        let mut out = regs.clone();
        for (reg, value) in regs.iter() {
            let next = if reg == arch.ip {
                arch.addr(return_addr)
            } else if reg == arch.sp {
                adjust_stack(defs, value, arch.call_stack_adjust)
            } else if arch.is_callee_saved(reg) || arch.zero_reg == Some(reg) {
                continue;
            } else {
                Value::Undef { ty: value.ty() }
            };
            if let Err(err) = out.set(reg, next) {
                warn!(arch = arch.name, %err, "cannot clobber register after call");
            }
        }
        out
    }
}

/// `value + delta` without emitting statements: literals are offset, and a
/// matching earlier adjustment is undone. Anything else becomes `Undef`.
pub fn adjust_stack(defs: &Definitions, value: &Value, delta: i64) -> Value {
    if delta == 0 {
        return value.clone();
    }
    let ty = value.ty();
    let Some(width) = ty.width() else {
        return Value::Undef { ty };
    };
    let delta = delta as u64;
    if let Some(v) = value.as_bv() {
        return Value::bv(width, v.wrapping_add(delta));
    }
    match defs.app(value) {
        Some(App::Binary {
            op: BinaryOp::Sub,
            left,
            right,
        }) if right == &Value::bv(width, delta) => left.clone(),
        Some(App::Binary {
            op: BinaryOp::Add,
            left,
            right,
        }) if right == &Value::bv(width, delta.wrapping_neg()) => left.clone(),
        _ => Value::Undef { ty },
    }
}

/// Symbolic registers with the instruction pointer at `entry` and the given
/// overrides applied. Ill-typed overrides are skipped.
pub fn entry_state(
    arch: &ArchDescriptor,
    entry: u64,
    overrides: impl IntoIterator<Item = (Reg, Value)>,
) -> RegState {
    let mut regs = RegState::symbolic(arch);
    for (reg, value) in std::iter::once((arch.ip, arch.addr(entry))).chain(overrides) {
        if let Err(err) = regs.set(reg, value) {
            warn!(arch = arch.name, %err, "skipping entry register");
        }
    }
    regs
}
