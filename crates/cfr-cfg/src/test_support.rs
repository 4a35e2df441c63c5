//! Fixtures shared by the classifier tests.

use cfr_ir::{
    App, ArchDescriptor, AssignId, AssignRhs, Assignment, Endianness, MemoryImage, Reg, RegInfo,
    RegState, Stmt, TernaryOp, Type, Value,
};
use cfr_mem::{PF_R, PF_W, PF_X, Segment};

use crate::context::Recognizers;
use crate::domain::{AbsValue, AbstractState, BranchFeasibility, Feasibility};

pub const PC: Reg = Reg(0);
pub const SP: Reg = Reg(1);
pub const LR: Reg = Reg(2);
pub const R0: Reg = Reg(3);
pub const Z: Reg = Reg(4);

pub fn arch() -> ArchDescriptor {
    ArchDescriptor {
        name: "toy",
        addr_width: 32,
        endianness: Endianness::Little,
        registers: vec![
            RegInfo::bv("pc", 32),
            RegInfo::bv("sp", 32),
            RegInfo::bv("lr", 32),
            RegInfo::bv("r0", 32),
            RegInfo::flag("z"),
        ],
        ip: PC,
        sp: SP,
        link_reg: Some(LR),
        zero_reg: None,
        callee_saved: vec![SP],
        call_stack_adjust: 0,
    }
}

pub fn mem() -> MemoryImage {
    MemoryImage::new(Endianness::Little)
        .with_segment(Segment::new(0x1000, vec![0; 0x100], PF_R | PF_X))
        .unwrap()
        .with_segment(Segment::new(0x2000, vec![0; 0x100], PF_R | PF_W))
        .unwrap()
}

/// Entry state with `lr` holding the return address.
pub fn entry_regs(arch: &ArchDescriptor) -> RegState {
    let mut regs = RegState::symbolic(arch);
    regs.set(LR, arch.return_addr()).unwrap();
    regs
}

/// `r{id} := select(z, on_true, on_false)`.
pub fn select(id: u64, on_true: Value, on_false: Value) -> (Stmt, Value) {
    let assignment = Assignment {
        id: AssignId(id),
        rhs: AssignRhs::App(App::Ternary {
            op: TernaryOp::Select,
            first: Value::Initial { reg: Z, ty: Type::Bool },
            second: on_true,
            third: on_false,
        }),
        ty: Type::Bv(32),
    };
    let value = assignment.value();
    (Stmt::Assign(assignment), value)
}

/// Calls leave a literal return address in `lr`; returns jump to it.
pub struct LinkRecognizers;

impl Recognizers for LinkRecognizers {
    fn identify_call(
        &self,
        mem: &MemoryImage,
        stmts: &[Stmt],
        regs: &RegState,
    ) -> Option<(Vec<Stmt>, u64)> {
        let ret = regs.get(LR)?.as_bv()?;
        mem.is_executable(ret).then(|| (stmts.to_vec(), ret))
    }

    fn identify_return(
        &self,
        stmts: &[Stmt],
        regs: &RegState,
        abs: &dyn AbstractState,
    ) -> Option<Vec<Stmt>> {
        (abs.transfer_value(regs.get(PC)?) == AbsValue::ReturnAddr).then(|| stmts.to_vec())
    }
}

/// Feasibility fixed in advance.
pub struct Fixed(pub Feasibility);

impl BranchFeasibility for Fixed {
    fn feasibility(&self, _cond: &Value) -> Feasibility {
        self.0
    }
}
