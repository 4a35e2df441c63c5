//! Toy byte-coded target shared by the integration tests.
//!
//! Encoding (immediates little-endian):
//!
//! | bytes          | effect                                   |
//! |----------------|------------------------------------------|
//! | `01 ii`        | `r0 := r1 + i`                           |
//! | `02 iiiiiiii`  | `r0 := i`                                |
//! | `03`           | `z := r0 == 0`                           |
//! | `04`           | `[sp] := r0`                             |
//! | `05`           | `r1 := r0 * 3`                           |
//! | `10`           | `pc := lr`                               |
//! | `11 iiiiiiii`  | `lr := next; pc := i`                    |
//! | `12 iiiiiiii`  | `pc := i`                                |
//! | `13 iiiiiiii`  | `pc := z ? i : next`                     |
//! | `14`           | `pc := z ? lr : next`                    |
//! | `15`           | `pc := r0`                               |
//! | `16 ii`        | `if z { r0 := r0 + i }`, split in blocks |
//! | `20`           | `syscall`                                |

#![allow(dead_code)]

use cfr::{
    AbstractState, ArchDescriptor, ArchHooks, ArchTermStmt, Architecture, ClassifierChain,
    ConditionalReturnClassifier, Endianness, Expr, Generator, InstructionSemantics, IrError,
    MemoryImage, PF_R, PF_W, PF_X, ParsedBlock, Recognizers, Reg, RegInfo, RegState, Segment,
    Stmt, Terminator, Value, entry_state, ip_is_return, link_register_call,
};

pub const PC: Reg = Reg(0);
pub const SP: Reg = Reg(1);
pub const LR: Reg = Reg(2);
pub const R0: Reg = Reg(3);
pub const R1: Reg = Reg(4);
pub const Z: Reg = Reg(5);

pub const CODE: u64 = 0x1000;
pub const DATA: u64 = 0x8000;

/// Install a test subscriber once; output shows with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn descriptor() -> ArchDescriptor {
    ArchDescriptor {
        name: "toy",
        addr_width: 32,
        endianness: Endianness::Little,
        registers: vec![
            RegInfo::bv("pc", 32),
            RegInfo::bv("sp", 32),
            RegInfo::bv("lr", 32),
            RegInfo::bv("r0", 32),
            RegInfo::bv("r1", 32),
            RegInfo::flag("z"),
        ],
        ip: PC,
        sp: SP,
        link_reg: Some(LR),
        zero_reg: None,
        callee_saved: vec![SP, R1],
        call_stack_adjust: 0,
    }
}

/// Code at [`CODE`], 0x100 bytes of writable data at [`DATA`].
pub fn image(code: &[u8]) -> MemoryImage {
    MemoryImage::new(Endianness::Little)
        .with_segment(Segment::new(CODE, code.to_vec(), PF_R | PF_X))
        .unwrap()
        .with_segment(Segment::new(DATA, vec![0; 0x100], PF_R | PF_W))
        .unwrap()
}

/// Toy instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    AddImm(u8),
    LoadImm(u32),
    TestZero,
    Store,
    Triple,
    Ret,
    Call(u32),
    Jmp(u32),
    BranchZ(u32),
    RetZ,
    JmpR0,
    PredAdd(u8),
    Syscall,
}

impl Op {
    pub fn encode(self, out: &mut Vec<u8>) {
        match self {
            Self::AddImm(i) => out.extend([0x01, i]),
            Self::LoadImm(i) => {
                out.push(0x02);
                out.extend(i.to_le_bytes());
            }
            Self::TestZero => out.push(0x03),
            Self::Store => out.push(0x04),
            Self::Triple => out.push(0x05),
            Self::Ret => out.push(0x10),
            Self::Call(t) => {
                out.push(0x11);
                out.extend(t.to_le_bytes());
            }
            Self::Jmp(t) => {
                out.push(0x12);
                out.extend(t.to_le_bytes());
            }
            Self::BranchZ(t) => {
                out.push(0x13);
                out.extend(t.to_le_bytes());
            }
            Self::RetZ => out.push(0x14),
            Self::JmpR0 => out.push(0x15),
            Self::PredAdd(i) => out.extend([0x16, i]),
            Self::Syscall => out.push(0x20),
        }
    }
}

pub fn asm(ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        op.encode(&mut out);
    }
    out
}

pub struct ToySemantics;

fn imm32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(1..5)?.try_into().ok()?))
}

impl InstructionSemantics for ToySemantics {
    type Instr = Op;

    fn decode(&self, bytes: &[u8], _addr: u64) -> Option<(Op, u8)> {
        let op = match *bytes.first()? {
            0x01 => (Op::AddImm(*bytes.get(1)?), 2),
            0x02 => (Op::LoadImm(imm32(bytes)?), 5),
            0x03 => (Op::TestZero, 1),
            0x04 => (Op::Store, 1),
            0x05 => (Op::Triple, 1),
            0x10 => (Op::Ret, 1),
            0x11 => (Op::Call(imm32(bytes)?), 5),
            0x12 => (Op::Jmp(imm32(bytes)?), 5),
            0x13 => (Op::BranchZ(imm32(bytes)?), 5),
            0x14 => (Op::RetZ, 1),
            0x15 => (Op::JmpR0, 1),
            0x16 => (Op::PredAdd(*bytes.get(1)?), 2),
            0x20 => (Op::Syscall, 1),
            _ => return None,
        };
        Some(op)
    }

    fn translate(
        &self,
        g: &mut Generator<'_>,
        instr: &Op,
        addr: u64,
        size: u8,
    ) -> Result<(), IrError> {
        let next = addr + u64::from(size);
        let arch = g.arch();
        match *instr {
            Op::AddImm(i) => {
                let r1 = g.get_register(R1)?;
                let sum = g.evaluate(Expr::add(r1.into(), Expr::bv(32, u64::from(i))))?;
                g.set_register(R0, sum)?;
                g.set_ip(next)
            }
            Op::LoadImm(i) => {
                g.set_register(R0, Value::bv(32, u64::from(i)))?;
                g.set_ip(next)
            }
            Op::TestZero => {
                let r0 = g.get_register(R0)?;
                let z = g.evaluate(Expr::eq(r0.into(), Expr::bv(32, 0)))?;
                g.set_register(Z, z)?;
                g.set_ip(next)
            }
            Op::Store => {
                let sp = g.get_register(SP)?;
                let r0 = g.get_register(R0)?;
                g.write_mem(sp, r0)?;
                g.set_ip(next)
            }
            Op::Triple => {
                let r0 = g.get_register(R0)?;
                let product = g.evaluate(Expr::mul(r0.into(), Expr::bv(32, 3)))?;
                g.set_register(R1, product)?;
                g.set_ip(next)
            }
            Op::Ret => {
                let lr = g.get_register(LR)?;
                g.set_register(PC, lr)
            }
            Op::Call(t) => {
                g.set_register(LR, arch.addr(next))?;
                g.set_ip(u64::from(t))
            }
            Op::Jmp(t) => g.set_ip(u64::from(t)),
            Op::BranchZ(t) => {
                let z = g.get_register(Z)?;
                let target = g.evaluate(Expr::select(
                    z.into(),
                    Expr::bv(32, u64::from(t)),
                    Expr::bv(32, next),
                ))?;
                g.set_register(PC, target)
            }
            Op::RetZ => {
                let z = g.get_register(Z)?;
                let lr = g.get_register(LR)?;
                let target = g.evaluate(Expr::select(z.into(), lr.into(), Expr::bv(32, next)))?;
                g.set_register(PC, target)
            }
            Op::JmpR0 => {
                let r0 = g.get_register(R0)?;
                g.set_register(PC, r0)
            }
            Op::PredAdd(i) => {
                let z = g.get_register(Z)?;
                g.branch(
                    z,
                    move |g| {
                        let r0 = g.get_register(R0)?;
                        let sum = g.evaluate(Expr::add(r0.into(), Expr::bv(32, u64::from(i))))?;
                        g.set_register(R0, sum)?;
                        g.set_ip(next)
                    },
                    move |g| g.set_ip(next),
                )
            }
            Op::Syscall => {
                g.set_ip(next)?;
                g.terminate_block(|regs| Terminator::Arch {
                    stmt: ArchTermStmt::new("syscall", Vec::new()),
                    regs,
                })?;
                Ok(())
            }
        }
    }
}

/// Tags each classified block with a comment naming its kind.
fn tag_kind(_arch: &ArchDescriptor, mut block: ParsedBlock) -> ParsedBlock {
    block
        .stmts
        .insert(0, Stmt::Comment(block.kind().as_str().to_string()));
    block
}

pub struct Toy {
    desc: ArchDescriptor,
    semantics: ToySemantics,
}

impl Toy {
    pub fn new() -> Self {
        Self {
            desc: descriptor(),
            semantics: ToySemantics,
        }
    }
}

impl Recognizers for Toy {
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

impl Architecture for Toy {
    type Semantics = ToySemantics;

    fn descriptor(&self) -> &ArchDescriptor {
        &self.desc
    }

    fn semantics(&self) -> &ToySemantics {
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
            rewrite_block: Some(tag_kind),
            ..ArchHooks::default()
        }
    }
}

/// Statements other than instruction markers and comments.
pub fn effects(block: &ParsedBlock) -> Vec<&Stmt> {
    block.stmts.iter().filter(|s| !s.is_pseudo()).collect()
}

/// Address of a decode failure.
pub fn decode_failed_at(err: &IrError) -> Option<u64> {
    match err {
        IrError::DecodeFailure { addr, .. } => Some(*addr),
        IrError::InvariantViolation(_) => None,
    }
}
