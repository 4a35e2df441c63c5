//! x86-64.
//!
//! The return address lives in memory at `[rsp]` on entry, so it is seeded
//! through the abstract state rather than a register. Calls push the
//! address of the next instruction.

use cfr_cfg::{AbstractState, Recognizers, StackSlot};
use cfr_ir::{ArchDescriptor, Endianness, MemoryImage, Reg, RegInfo, RegState, Stmt, Value};

use crate::{
    ArchHooks, Architecture, InstructionSemantics, entry_state, ip_is_return, stack_call,
};

pub const RAX: Reg = Reg(0);
pub const RCX: Reg = Reg(1);
pub const RDX: Reg = Reg(2);
pub const RBX: Reg = Reg(3);
pub const RSP: Reg = Reg(4);
pub const RBP: Reg = Reg(5);
pub const RSI: Reg = Reg(6);
pub const RDI: Reg = Reg(7);
pub const R8: Reg = Reg(8);
pub const R9: Reg = Reg(9);
pub const R10: Reg = Reg(10);
pub const R11: Reg = Reg(11);
pub const R12: Reg = Reg(12);
pub const R13: Reg = Reg(13);
pub const R14: Reg = Reg(14);
pub const R15: Reg = Reg(15);
pub const RIP: Reg = Reg(16);
pub const CF: Reg = Reg(17);
pub const PF: Reg = Reg(18);
pub const AF: Reg = Reg(19);
pub const ZF: Reg = Reg(20);
pub const SF: Reg = Reg(21);
pub const DF: Reg = Reg(22);
pub const OF: Reg = Reg(23);

const GPR_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];

const FLAG_NAMES: [&str; 7] = ["cf", "pf", "af", "zf", "sf", "df", "of"];

/// x86-64 register file and calling convention.
pub fn descriptor() -> ArchDescriptor {
    let mut registers: Vec<_> = GPR_NAMES.iter().map(|&name| RegInfo::bv(name, 64)).collect();
    registers.push(RegInfo::bv("rip", 64));
    registers.extend(FLAG_NAMES.iter().map(|&name| RegInfo::flag(name)));
    ArchDescriptor {
        name: "x86_64",
        addr_width: 64,
        endianness: Endianness::Little,
        registers,
        ip: RIP,
        sp: RSP,
        link_reg: None,
        zero_reg: None,
        callee_saved: vec![RBX, RSP, RBP, R12, R13, R14, R15],
        // `ret` pops the pushed return address
        call_stack_adjust: 8,
    }
}

fn seed_return_slot(arch: &ArchDescriptor) -> Vec<StackSlot> {
    vec![StackSlot {
        base: arch.sp,
        offset: 0,
    }]
}

/// x86-64 with the given instruction semantics.
pub struct X86_64<S> {
    desc: ArchDescriptor,
    semantics: S,
}

impl<S> X86_64<S> {
    pub fn new(semantics: S) -> Self {
        Self {
            desc: descriptor(),
            semantics,
        }
    }
}

impl<S> Recognizers for X86_64<S> {
    fn identify_call(
        &self,
        mem: &MemoryImage,
        stmts: &[Stmt],
        regs: &RegState,
    ) -> Option<(Vec<Stmt>, u64)> {
        stack_call(&self.desc, mem, stmts, regs)
    }

    fn identify_return(
        &self,
        stmts: &[Stmt],
        regs: &RegState,
        abs: &dyn AbstractState,
    ) -> Option<Vec<Stmt>> {
        ip_is_return(&self.desc, stmts, regs, abs)
    }
}

impl<S: InstructionSemantics> Architecture for X86_64<S> {
    type Semantics = S;

    fn descriptor(&self) -> &ArchDescriptor {
        &self.desc
    }

    fn semantics(&self) -> &S {
        &self.semantics
    }

    fn initial_register_state(&self, entry: u64) -> RegState {
        entry_state(&self.desc, entry, [(DF, Value::bool(false))])
    }

    fn hooks(&self) -> ArchHooks {
        ArchHooks {
            seed_abs_state: Some(seed_return_slot),
            ..ArchHooks::default()
        }
    }
}
