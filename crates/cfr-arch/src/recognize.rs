//! Call and return recognition shared by the targets.

use cfr_cfg::{AbsValue, AbstractState};
use cfr_ir::{ArchDescriptor, MemoryImage, RegState, Stmt};

/// Address following the last decoded instruction of `stmts`.
pub fn next_instruction_addr(stmts: &[Stmt]) -> Option<u64> {
    stmts.iter().rev().find_map(|stmt| match stmt {
        Stmt::InstructionStart { addr, size } => Some(addr.wrapping_add(u64::from(*size))),
        _ => None,
    })
}

/// A call that leaves the address of the next instruction in the link
/// register and transfers control elsewhere.
pub fn link_register_call(
    arch: &ArchDescriptor,
    mem: &MemoryImage,
    stmts: &[Stmt],
    regs: &RegState,
) -> Option<(Vec<Stmt>, u64)> {
    let ret = regs.get(arch.link_reg?)?.resolve_address(mem)?;
    if next_instruction_addr(stmts) != Some(ret) || !mem.is_executable(ret) {
        return None;
    }
    if regs.get(arch.ip)?.resolve_address(mem) == Some(ret) {
        return None;
    }
    Some((stmts.to_vec(), ret))
}

/// A call that pushes the address of the next instruction: the last memory
/// write stores an executable literal to the final stack pointer. The push
/// itself is dropped from the kept statements.
pub fn stack_call(
    arch: &ArchDescriptor,
    mem: &MemoryImage,
    stmts: &[Stmt],
    regs: &RegState,
) -> Option<(Vec<Stmt>, u64)> {
    let sp = regs.get(arch.sp)?;
    let (pos, addr, value) = stmts
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, stmt)| match stmt {
            Stmt::WriteMem { addr, value } => Some((i, addr, value)),
            _ => None,
        })?;
    if addr != sp {
        return None;
    }
    let ret = value.resolve_address(mem)?;
    if next_instruction_addr(stmts) != Some(ret) || !mem.is_executable(ret) {
        return None;
    }
    let mut kept = stmts.to_vec();
    kept.remove(pos);
    Some((kept, ret))
}

/// A return: the final instruction pointer carries the entry return address.
pub fn ip_is_return(
    arch: &ArchDescriptor,
    stmts: &[Stmt],
    regs: &RegState,
    abs: &dyn AbstractState,
) -> Option<Vec<Stmt>> {
    let ip = regs.get(arch.ip)?;
    (abs.transfer_value(ip) == AbsValue::ReturnAddr).then(|| stmts.to_vec())
}

#[cfg(test)]
mod tests {
    use cfr_cfg::{Definitions, SentinelDomain};
    use cfr_ir::{
        App, AssignId, AssignRhs, Assignment, BinaryOp, Endianness, Reg, RegInfo, Type, Value,
    };
    use cfr_mem::{PF_R, PF_X, Segment};

    use super::*;

    const PC: Reg = Reg(0);
    const SP: Reg = Reg(1);
    const LR: Reg = Reg(2);

    fn arch() -> ArchDescriptor {
        ArchDescriptor {
            name: "toy",
            addr_width: 32,
            endianness: Endianness::Little,
            registers: vec![
                RegInfo::bv("pc", 32),
                RegInfo::bv("sp", 32),
                RegInfo::bv("lr", 32),
            ],
            ip: PC,
            sp: SP,
            link_reg: Some(LR),
            zero_reg: None,
            callee_saved: vec![SP],
            call_stack_adjust: 0,
        }
    }

    fn mem() -> MemoryImage {
        MemoryImage::new(Endianness::Little)
            .with_segment(Segment::new(0x1000, vec![0; 0x100], PF_R | PF_X))
            .unwrap()
    }

    fn start(addr: u64, size: u8) -> Stmt {
        Stmt::InstructionStart { addr, size }
    }

    #[test]
    fn test_link_register_call() {
        let arch = arch();
        let mem = mem();
        let stmts = vec![start(0x1000, 4), start(0x1004, 4)];
        let mut regs = RegState::symbolic(&arch);
        regs.set(LR, Value::bv(32, 0x1008)).unwrap();
        regs.set(PC, Value::bv(32, 0x1040)).unwrap();
        let (kept, ret) = link_register_call(&arch, &mem, &stmts, &regs).unwrap();
        assert_eq!(ret, 0x1008);
        assert_eq!(kept, stmts);

        // Plain fallthrough with a stale link value is not a call
        regs.set(PC, Value::bv(32, 0x1008)).unwrap();
        assert!(link_register_call(&arch, &mem, &stmts, &regs).is_none());

        // Link register not pointing at the next instruction
        regs.set(PC, Value::bv(32, 0x1040)).unwrap();
        regs.set(LR, Value::bv(32, 0x1010)).unwrap();
        assert!(link_register_call(&arch, &mem, &stmts, &regs).is_none());
    }

    #[test]
    fn test_stack_call_drops_push() {
        let arch = arch();
        let mem = mem();
        let new_sp = Value::Assign {
            id: AssignId(0),
            ty: Type::Bv(32),
        };
        let stmts = vec![
            start(0x1000, 5),
            Stmt::Assign(Assignment {
                id: AssignId(0),
                rhs: AssignRhs::App(App::Binary {
                    op: BinaryOp::Sub,
                    left: Value::Initial {
                        reg: SP,
                        ty: Type::Bv(32),
                    },
                    right: Value::bv(32, 4),
                }),
                ty: Type::Bv(32),
            }),
            Stmt::WriteMem {
                addr: new_sp.clone(),
                value: Value::bv(32, 0x1005),
            },
        ];
        let mut regs = RegState::symbolic(&arch);
        regs.set(SP, new_sp).unwrap();
        regs.set(PC, Value::bv(32, 0x1080)).unwrap();
        let (kept, ret) = stack_call(&arch, &mem, &stmts, &regs).unwrap();
        assert_eq!(ret, 0x1005);
        assert_eq!(kept, stmts[..2].to_vec());

        // Push to somewhere other than the final stack pointer
        let regs = RegState::symbolic(&arch);
        assert!(stack_call(&arch, &mem, &stmts, &regs).is_none());
    }

    #[test]
    fn test_ip_is_return() {
        let arch = arch();
        let defs = Definitions::new();
        let abs = SentinelDomain::new(&defs, &[], 32, None);
        let mut regs = RegState::symbolic(&arch);
        assert!(ip_is_return(&arch, &[], &regs, &abs).is_none());
        regs.set(PC, arch.return_addr()).unwrap();
        assert_eq!(ip_is_return(&arch, &[], &regs, &abs), Some(Vec::new()));
    }
}
