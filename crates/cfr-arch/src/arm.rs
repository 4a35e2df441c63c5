//! ARM (A32).
//!
//! Calls leave the return address in `lr`. Returns may be predicated
//! (`bxeq lr`) and may go through `bx`, which clears the Thumb bit of its
//! target; both forms keep the return address recognizable.

use cfr_cfg::{
    AbsValue, AbstractState, ClassifierChain, ConditionalReturnClassifier, Recognizers,
};
use cfr_ir::{ArchDescriptor, ArchPrim, Endianness, MemoryImage, Reg, RegInfo, RegState, Stmt};

use crate::{
    ArchHooks, Architecture, InstructionSemantics, entry_state, ip_is_return, link_register_call,
};

pub const SP: Reg = Reg(13);
pub const LR: Reg = Reg(14);
pub const PC: Reg = Reg(15);
pub const N: Reg = Reg(16);
pub const Z: Reg = Reg(17);
pub const C: Reg = Reg(18);
pub const V: Reg = Reg(19);

/// General-purpose register `r{n}`, `n < 13`.
pub const fn r(n: u16) -> Reg {
    Reg(n)
}

const REG_NAMES: [&str; 16] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp", "lr",
    "pc",
];

/// Primitive computing a `bx`/`blx` target from a register value.
pub const INTERWORKING_TARGET: &str = "interworking_target";

/// ARM register file and calling convention.
pub fn descriptor() -> ArchDescriptor {
    let mut registers: Vec<_> = REG_NAMES.iter().map(|&name| RegInfo::bv(name, 32)).collect();
    registers.extend(["n", "z", "c", "v"].map(RegInfo::flag));
    ArchDescriptor {
        name: "arm",
        addr_width: 32,
        endianness: Endianness::Little,
        registers,
        ip: PC,
        sp: SP,
        link_reg: Some(LR),
        zero_reg: None,
        callee_saved: (4..12).map(r).chain([SP]).collect(),
        call_stack_adjust: 0,
    }
}

/// The interworking target of the return address is the return address.
fn eval_interworking(prim: &ArchPrim, args: &[AbsValue]) -> Option<AbsValue> {
    if prim.name != INTERWORKING_TARGET {
        return None;
    }
    args.first().copied()
}

/// ARM with the given instruction semantics.
pub struct Arm<S> {
    desc: ArchDescriptor,
    semantics: S,
}

impl<S> Arm<S> {
    pub fn new(semantics: S) -> Self {
        Self {
            desc: descriptor(),
            semantics,
        }
    }
}

impl<S> Recognizers for Arm<S> {
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

impl<S: InstructionSemantics> Architecture for Arm<S> {
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
        ArchHooks {
            eval_arch_prim: Some(eval_interworking),
            ..ArchHooks::default()
        }
    }
}
