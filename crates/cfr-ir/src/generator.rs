//! Block generator.
//!
//! Instruction semantics drive a [`Generator`] to emit statements into the
//! currently open block. Expressions are folded bottom-up and deduplicated
//! per block, so evaluating the same expression twice never emits twice.
//!
//! Symbolic branches are resolved with an explicit worklist of pending
//! arms: the open block is closed with a [`Terminator::Branch`] and each arm
//! continues on a fresh block that starts from a copy of the register state.
//! Arms queued by a nested branch join the same worklist, so blocks finish
//! in index order.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::arch::{ArchDescriptor, Reg};
use crate::block::{Block, BlockIndex, BlockSeq};
use crate::expr::{App, Expr};
use crate::fold::fold;
use crate::regs::RegState;
use crate::stmt::{ArchPrim, AssignRhs, Assignment, Stmt};
use crate::terminator::Terminator;
use crate::value::{AssignIdSource, Type, Value};
use crate::{MemoryImage, Result, Violation};

/// A block under construction.
#[derive(Clone, Debug)]
pub struct PreBlock {
    pub index: BlockIndex,
    pub addr: u64,
    pub stmts: Vec<Stmt>,
    pub regs: RegState,
    memo: FxHashMap<AssignRhs, Value>,
}

impl PreBlock {
    fn new(index: BlockIndex, addr: u64, regs: RegState) -> Self {
        Self {
            index,
            addr,
            stmts: Vec::new(),
            regs,
            memo: FxHashMap::default(),
        }
    }
}

#[derive(Clone, Debug)]
enum State {
    Open(PreBlock),
    Terminated,
}

impl State {
    const fn open(&mut self) -> std::result::Result<&mut PreBlock, Violation> {
        match self {
            Self::Open(block) => Ok(block),
            Self::Terminated => Err(Violation::AlreadyTerminated),
        }
    }
}

type ArmFn<'a> = Box<dyn FnOnce(&mut Generator<'a>) -> Result<()> + 'a>;

/// One pending arm of a symbolic branch.
struct PendingArm<'a> {
    index: BlockIndex,
    regs: RegState,
    run: ArmFn<'a>,
}

/// Saved generator state for undoing a failed instruction.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    state: State,
    finished: usize,
    next_index: u32,
    instr_addr: u64,
}

/// Statement emitter for one block sequence.
pub struct Generator<'a> {
    arch: &'a ArchDescriptor,
    mem: &'a MemoryImage,
    ids: &'a mut AssignIdSource,
    seq: &'a mut BlockSeq,
    state: State,
    instr_addr: u64,
    pending: VecDeque<PendingArm<'a>>,
    draining: bool,
}

impl<'a> Generator<'a> {
    /// Open a new block at `addr` with the given register state.
    pub fn new(
        arch: &'a ArchDescriptor,
        mem: &'a MemoryImage,
        ids: &'a mut AssignIdSource,
        seq: &'a mut BlockSeq,
        addr: u64,
        regs: RegState,
    ) -> Self {
        let index = seq.alloc_index();
        Self {
            arch,
            mem,
            ids,
            seq,
            state: State::Open(PreBlock::new(index, addr, regs)),
            instr_addr: addr,
            pending: VecDeque::new(),
            draining: false,
        }
    }

    pub const fn arch(&self) -> &'a ArchDescriptor {
        self.arch
    }

    pub const fn mem(&self) -> &'a MemoryImage {
        self.mem
    }

    /// Address of the instruction being translated.
    pub const fn instr_addr(&self) -> u64 {
        self.instr_addr
    }

    pub const fn set_instr_addr(&mut self, addr: u64) {
        self.instr_addr = addr;
    }

    /// Check if a block is open.
    pub const fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Register state of the open block.
    pub const fn current_regs(&self) -> Option<&RegState> {
        match &self.state {
            State::Open(block) => Some(&block.regs),
            State::Terminated => None,
        }
    }

    /// Statements of the open block.
    pub fn current_stmts(&self) -> &[Stmt] {
        match &self.state {
            State::Open(block) => &block.stmts,
            State::Terminated => &[],
        }
    }

    /// Read a register.
    pub fn get_register(&mut self, reg: Reg) -> Result<Value> {
        let block = self.state.open()?;
        Ok(block
            .regs
            .get(reg)
            .ok_or(Violation::UnknownRegister(reg))?
            .clone())
    }

    /// Write a register. Writes to a hard-wired zero register are dropped.
    pub fn set_register(&mut self, reg: Reg, value: Value) -> Result<()> {
        let block = self.state.open()?;
        if self.arch.zero_reg == Some(reg) {
            return Ok(());
        }
        block.regs.set(reg, value)?;
        Ok(())
    }

    /// Set the instruction pointer to a literal address.
    pub fn set_ip(&mut self, addr: u64) -> Result<()> {
        self.set_register(self.arch.ip, self.arch.addr(addr))
    }

    /// Append a statement.
    pub fn emit_statement(&mut self, stmt: Stmt) -> Result<()> {
        let block = self.state.open()?;
        trace!(block = %block.index, stmt = %stmt, "emit");
        block.stmts.push(stmt);
        Ok(())
    }

    /// Evaluate an expression to a value, folding and deduplicating.
    pub fn evaluate(&mut self, expr: Expr) -> Result<Value> {
        match expr {
            Expr::Value(value) => Ok(value),
            Expr::App(app) => {
                let app = (*app).try_map(|operand| self.evaluate(operand))?;
                self.evaluate_app(app)
            }
        }
    }

    /// Evaluate an application whose operands are already values.
    pub fn evaluate_app(&mut self, app: App<Value>) -> Result<Value> {
        let ty = app.result_type(Value::ty)?;
        if let Some(value) = fold(&app) {
            // Folding must never change a value's type
            debug_assert_eq!(value.ty(), ty);
            return Ok(value);
        }
        self.define(AssignRhs::App(app), ty, true)
    }

    /// Evaluate an architecture primitive. Never folded; deduplicated only
    /// when the primitive is pure.
    pub fn evaluate_arch_primitive(&mut self, prim: ArchPrim) -> Result<Value> {
        let ty = prim.ty;
        let memoize = prim.pure;
        self.define(AssignRhs::Prim(prim), ty, memoize)
    }

    /// Read `bytes` bytes at `addr`. Literal addresses in read-only memory
    /// are read directly; everything else emits a read.
    pub fn read_mem(&mut self, addr: Value, bytes: u8) -> Result<Value> {
        self.check_addr("read_mem", &addr)?;
        let ty = mem_type(bytes)?;
        let constant = addr
            .resolve_address(self.mem)
            .and_then(|a| self.mem.read_readonly(a, usize::from(bytes)));
        if let Some(v) = constant {
            return Ok(Value::bv(u16::from(bytes) * 8, v));
        }
        self.define(AssignRhs::ReadMem { addr, bytes }, ty, false)
    }

    /// Store a bitvector value at `addr`.
    pub fn write_mem(&mut self, addr: Value, value: Value) -> Result<()> {
        self.check_addr("write_mem", &addr)?;
        if value.ty().is_bool() {
            return Err(Violation::IllTyped {
                op: "write_mem",
                detail: "cannot store a boolean".to_string(),
            }
            .into());
        }
        self.emit_statement(Stmt::WriteMem { addr, value })
    }

    fn check_addr(&self, op: &'static str, addr: &Value) -> std::result::Result<(), Violation> {
        if addr.ty() == self.arch.addr_type() {
            Ok(())
        } else {
            Err(Violation::IllTyped {
                op,
                detail: format!("address has type {}", addr.ty()),
            })
        }
    }

    fn define(&mut self, rhs: AssignRhs, ty: Type, memoize: bool) -> Result<Value> {
        let block = self.state.open()?;
        // Clobbered operands compare equal structurally but not in value
        let memoize = memoize
            && !rhs
                .operands()
                .iter()
                .any(|v| matches!(v, Value::Undef { .. }));
        if memoize {
            if let Some(existing) = block.memo.get(&rhs) {
                return Ok(existing.clone());
            }
        }
        let assignment = Assignment {
            id: self.ids.fresh(),
            rhs,
            ty,
        };
        let value = assignment.value();
        trace!(block = %block.index, id = %assignment.id, rhs = %assignment.rhs, "assign");
        if memoize {
            block.memo.insert(assignment.rhs.clone(), value.clone());
        }
        block.stmts.push(Stmt::Assign(assignment));
        Ok(value)
    }

    /// Close the open block with a terminator built from its final registers.
    pub fn terminate_block(
        &mut self,
        build: impl FnOnce(RegState) -> Terminator,
    ) -> Result<BlockIndex> {
        let State::Open(block) = std::mem::replace(&mut self.state, State::Terminated) else {
            return Err(Violation::AlreadyTerminated.into());
        };
        let term = build(block.regs);
        trace!(block = %block.index, addr = block.addr, kind = term.kind(), "terminate");
        let index = block.index;
        self.seq.push(Block {
            index,
            addr: block.addr,
            stmts: block.stmts,
            term,
        })?;
        Ok(index)
    }

    /// Split on a boolean condition.
    ///
    /// A literal condition runs only the taken arm, in the open block.
    /// Otherwise the open block ends in a branch and each arm runs on a
    /// fresh block; an arm that leaves its block open falls through to
    /// `FetchAndExecute`. Arms run in the order their blocks were allocated,
    /// after the arms already queued by an enclosing branch. The generator
    /// is terminated afterwards.
    pub fn branch<T, F>(&mut self, cond: Value, on_true: T, on_false: F) -> Result<()>
    where
        T: FnOnce(&mut Self) -> Result<()> + 'a,
        F: FnOnce(&mut Self) -> Result<()> + 'a,
    {
        if cond.ty() != Type::Bool {
            return Err(Violation::IllTyped {
                op: "branch",
                detail: format!("condition has type {}", cond.ty()),
            }
            .into());
        }
        if let Some(taken) = cond.as_bool() {
            return if taken { on_true(self) } else { on_false(self) };
        }

        let regs = self.state.open()?.regs.clone();
        let true_index = self.seq.alloc_index();
        let false_index = self.seq.alloc_index();
        self.terminate_block(|_| Terminator::Branch {
            cond,
            on_true: true_index,
            on_false: false_index,
        })?;
        self.pending.push_back(PendingArm {
            index: true_index,
            regs: regs.clone(),
            run: Box::new(on_true),
        });
        self.pending.push_back(PendingArm {
            index: false_index,
            regs,
            run: Box::new(on_false),
        });
        if self.draining {
            return Ok(());
        }

        self.draining = true;
        let result = self.drain_arms();
        self.draining = false;
        self.pending.clear();
        result
    }

    fn drain_arms(&mut self) -> Result<()> {
        while let Some(arm) = self.pending.pop_front() {
            self.state = State::Open(PreBlock::new(arm.index, self.instr_addr, arm.regs));
            (arm.run)(self)?;
            if self.is_open() {
                self.terminate_block(Terminator::FetchAndExecute)?;
            }
        }
        Ok(())
    }

    /// Save the current state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            state: self.state.clone(),
            finished: self.seq.len(),
            next_index: self.seq.allocated(),
            instr_addr: self.instr_addr,
        }
    }

    /// Restore a saved state, discarding blocks finished since.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.seq.truncate(checkpoint.finished, checkpoint.next_index);
        self.state = checkpoint.state;
        self.instr_addr = checkpoint.instr_addr;
    }
}

fn mem_type(bytes: u8) -> std::result::Result<Type, Violation> {
    if matches!(bytes, 1 | 2 | 4 | 8) {
        Ok(Type::Bv(u16::from(bytes) * 8))
    } else {
        Err(Violation::IllTyped {
            op: "read_mem",
            detail: format!("unsupported access size {bytes}"),
        })
    }
}
