//! PowerPC64 (big-endian).
//!
//! `bl` leaves the return address in `lr`; `blr` and its conditional forms
//! (`beqlr` and kin) return through it.

use cfr_cfg::{AbstractState, ClassifierChain, ConditionalReturnClassifier, Recognizers};
use cfr_ir::{ArchDescriptor, Endianness, MemoryImage, Reg, RegInfo, RegState, Stmt};

use crate::{
    ArchHooks, Architecture, InstructionSemantics, entry_state, ip_is_return, link_register_call,
};

pub const SP: Reg = Reg(1);
pub const TOC: Reg = Reg(2);
pub const LR: Reg = Reg(32);
pub const CTR: Reg = Reg(33);
pub const CR: Reg = Reg(34);
pub const XER: Reg = Reg(35);
pub const PC: Reg = Reg(36);

/// General-purpose register `r{n}`, `n < 32`.
pub const fn r(n: u16) -> Reg {
    Reg(n)
}

const GPR_NAMES: [&str; 32] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13", "r14",
    "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26", "r27",
    "r28", "r29", "r30", "r31",
];

/// PowerPC64 register file and ELFv2 calling convention.
pub fn descriptor() -> ArchDescriptor {
    let mut registers: Vec<_> = GPR_NAMES.iter().map(|&name| RegInfo::bv(name, 64)).collect();
    registers.extend([
        RegInfo::bv("lr", 64),
        RegInfo::bv("ctr", 64),
        RegInfo::bv("cr", 32),
        RegInfo::bv("xer", 64),
        RegInfo::bv("pc", 64),
    ]);
    ArchDescriptor {
        name: "ppc64",
        addr_width: 64,
        endianness: Endianness::Big,
        registers,
        ip: PC,
        sp: SP,
        link_reg: Some(LR),
        zero_reg: None,
        callee_saved: [SP, TOC].into_iter().chain((14..32).map(r)).collect(),
        call_stack_adjust: 0,
    }
}

/// PowerPC64 with the given instruction semantics.
pub struct Ppc64<S> {
    desc: ArchDescriptor,
    semantics: S,
}

impl<S> Ppc64<S> {
    pub fn new(semantics: S) -> Self {
        Self {
            desc: descriptor(),
            semantics,
        }
    }
}

impl<S> Recognizers for Ppc64<S> {
    fn identify_call(
        &self,
        mem: &MemoryImage,
        stmts: &[Stmt],
        regs: &RegState,
    ) -> Option<(Vec<Stmt>, u64)> {
        link_register_call(&self.desc, mem, stmts, regs)
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

impl<S: InstructionSemantics> Architecture for Ppc64<S> {
    type Semantics = S;

    fn descriptor(&self) -> &ArchDescriptor {
        &self.desc
    }

    fn semantics(&self) -> &S {
        &self.semantics
    }

    fn initial_register_state(&self, entry: u64) -> RegState {
        entry_state(&self.desc, entry, [(LR, self.desc.return_addr())])
    }

    fn classifiers(&self) -> ClassifierChain {
        ClassifierChain::with_arch_classifiers(vec![Box::new(ConditionalReturnClassifier)])
    }

    fn hooks(&self) -> ArchHooks {
        ArchHooks::default()
    }
}
