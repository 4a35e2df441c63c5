//! RISC-V 64.
//!
//! `jal`/`jalr` leave the return address in `ra`; `x0` is hard-wired to
//! zero. `jalr` clears bit 0 of its target, which keeps a returned `ra`
//! recognizable.

use cfr_cfg::{AbstractState, Recognizers};
use cfr_ir::{ArchDescriptor, Endianness, MemoryImage, Reg, RegInfo, RegState, Stmt};

use crate::{
    ArchHooks, Architecture, InstructionSemantics, entry_state, ip_is_return, link_register_call,
};

pub const ZERO: Reg = Reg(0);
pub const RA: Reg = Reg(1);
pub const SP: Reg = Reg(2);
pub const GP: Reg = Reg(3);
pub const TP: Reg = Reg(4);
pub const S0: Reg = Reg(8);
pub const S1: Reg = Reg(9);
pub const A0: Reg = Reg(10);
pub const A1: Reg = Reg(11);
pub const PC: Reg = Reg(32);

/// Integer register `x{n}`, `n < 32`.
pub const fn x(n: u16) -> Reg {
    Reg(n)
}

/// ABI names for x0..x31.
const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// RV64 register file and LP64 calling convention.
pub fn descriptor() -> ArchDescriptor {
    let mut registers: Vec<_> = ABI_NAMES.iter().map(|&name| RegInfo::bv(name, 64)).collect();
    registers.push(RegInfo::bv("pc", 64));
    ArchDescriptor {
        name: "riscv64",
        addr_width: 64,
        endianness: Endianness::Little,
        registers,
        ip: PC,
        sp: SP,
        link_reg: Some(RA),
        zero_reg: Some(ZERO),
        // sp, s0-s1, s2-s11
        callee_saved: [SP, S0, S1].into_iter().chain((18..28).map(x)).collect(),
        call_stack_adjust: 0,
    }
}

/// RISC-V 64 with the given instruction semantics.
pub struct RiscV<S> {
    desc: ArchDescriptor,
    semantics: S,
}

impl<S> RiscV<S> {
    pub fn new(semantics: S) -> Self {
        Self {
            desc: descriptor(),
            semantics,
        }
    }
}

impl<S> Recognizers for RiscV<S> {
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

impl<S: InstructionSemantics> Architecture for RiscV<S> {
    type Semantics = S;

    fn descriptor(&self) -> &ArchDescriptor {
        &self.desc
    }

    fn semantics(&self) -> &S {
        &self.semantics
    }

    fn initial_register_state(&self, entry: u64) -> RegState {
        entry_state(&self.desc, entry, [(RA, self.desc.return_addr())])
    }

    fn hooks(&self) -> ArchHooks {
        ArchHooks::default()
    }
}

#[cfg(test)]
mod tests {
    use cfr_cfg::TerminatorKind;
    use cfr_ir::{App, AssignRhs, BinaryOp, Type, Value};

    use super::*;
    use crate::test_support::{NoSemantics, assign, classify, start};

    #[test]
    fn test_descriptor() {
        let desc = descriptor();
        assert_eq!(desc.num_regs(), 33);
        assert_eq!(desc.reg_by_name("a0"), Some(A0));
        assert_eq!(desc.reg_by_name("s11"), Some(x(27)));
        assert_eq!(desc.reg_by_name("t6"), Some(x(31)));
        assert!(desc.is_callee_saved(x(27)));
        assert!(!desc.is_callee_saved(x(28)));
        assert!(!desc.is_callee_saved(RA));
    }

    #[test]
    fn test_initial_state() {
        let arch = RiscV::new(NoSemantics);
        let regs = arch.initial_register_state(0x1000);
        assert_eq!(regs.get(ZERO), Some(&Value::bv(64, 0)));
        assert_eq!(regs.get(RA), Some(&Value::ReturnAddr { width: 64 }));
        assert_eq!(regs.get(PC), Some(&Value::bv(64, 0x1000)));
    }

    #[test]
    fn test_jalr_ra_returns() {
        let arch = RiscV::new(NoSemantics);
        let (mask, target) = assign(
            0,
            AssignRhs::App(App::Binary {
                op: BinaryOp::And,
                left: Value::ReturnAddr { width: 64 },
                right: Value::bv(64, !1),
            }),
            Type::Bv(64),
        );
        let mut regs = arch.initial_register_state(0x1000);
        regs.set(PC, target).unwrap();
        let parsed = classify(&arch, vec![start(0x1000, 4), mask], regs).unwrap();
        assert_eq!(parsed.kind(), TerminatorKind::Return);
    }

    #[test]
    fn test_jal_is_a_call() {
        let arch = RiscV::new(NoSemantics);
        let mut regs = arch.initial_register_state(0x1000);
        regs.set(RA, Value::bv(64, 0x1004)).unwrap();
        regs.set(PC, Value::bv(64, 0x1080)).unwrap();
        let parsed = classify(&arch, vec![start(0x1000, 4)], regs).unwrap();
        assert_eq!(parsed.kind(), TerminatorKind::Call);
        assert_eq!(parsed.successors, vec![0x1004]);
        assert_eq!(parsed.new_functions, vec![0x1080]);
    }

    #[test]
    fn test_plain_jump() {
        let arch = RiscV::new(NoSemantics);
        let mut regs = arch.initial_register_state(0x1000);
        regs.set(PC, Value::bv(64, 0x1040)).unwrap();
        let parsed = classify(&arch, vec![start(0x1000, 4)], regs).unwrap();
        assert_eq!(parsed.kind(), TerminatorKind::Fallthrough);
        assert_eq!(parsed.successors, vec![0x1040]);
    }
}
