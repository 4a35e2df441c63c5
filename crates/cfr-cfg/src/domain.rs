//! Abstract-domain and branch-feasibility interfaces.
//!
//! The classifiers only ask two questions of the surrounding analysis:
//! whether a value is the entry return address, and which arms of a branch
//! are reachable. [`SentinelDomain`] and [`ConservativeBounds`] answer them
//! from the statements alone.

use cfr_ir::{
    App, ArchPrim, AssignId, AssignRhs, BinaryOp, Reg, Stmt, Type, Value, mask,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Abstract value as seen by the classifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbsValue {
    /// Exactly the return address seeded at function entry.
    ReturnAddr,
    Other,
}

/// Abstract interpretation state.
pub trait AbstractState {
    fn transfer_value(&self, value: &Value) -> AbsValue;
}

/// Which arms of a branch can execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feasibility {
    Both,
    TrueOnly,
    FalseOnly,
    Neither,
}

/// Branch feasibility oracle.
pub trait BranchFeasibility {
    fn feasibility(&self, cond: &Value) -> Feasibility;
}

/// Feasibility from the condition alone: literals decide, anything else
/// may go either way.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConservativeBounds;

impl BranchFeasibility for ConservativeBounds {
    fn feasibility(&self, cond: &Value) -> Feasibility {
        match cond.as_bool() {
            Some(true) => Feasibility::TrueOnly,
            Some(false) => Feasibility::FalseOnly,
            None => Feasibility::Both,
        }
    }
}

/// Assignment definitions and memory writes seen so far in a discovery unit.
#[derive(Clone, Debug, Default)]
pub struct Definitions {
    defs: FxHashMap<AssignId, AssignRhs>,
    writes: Vec<(Value, Value)>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stmts(stmts: &[Stmt]) -> Self {
        let mut defs = Self::new();
        defs.record(stmts);
        defs
    }

    /// Record the assignments and stores of a block.
    pub fn record(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Assign(a) => {
                    self.defs.insert(a.id, a.rhs.clone());
                }
                Stmt::WriteMem { addr, value } => self.writes.push((addr.clone(), value.clone())),
                _ => {}
            }
        }
    }

    /// Right-hand side defining `value`, if it is an assignment.
    pub fn get(&self, value: &Value) -> Option<&AssignRhs> {
        self.defs.get(&value.as_assign()?)
    }

    /// Operator application defining `value`.
    pub fn app(&self, value: &Value) -> Option<&App<Value>> {
        match self.get(value)? {
            AssignRhs::App(app) => Some(app),
            _ => None,
        }
    }

    /// Recorded stores in order.
    pub fn writes(&self) -> &[(Value, Value)] {
        &self.writes
    }

    /// `value` as `base + offset`, where `base` is a register's entry value.
    pub fn linear(&self, value: &Value) -> Option<Linear> {
        let width = value.ty().width()?;
        let lin = match value {
            Value::Initial { reg, .. } => Linear {
                base: Some(*reg),
                offset: 0,
            },
            Value::Bv { value, .. } => Linear {
                base: None,
                offset: *value,
            },
            Value::Assign { .. } => match self.app(value)? {
                App::Binary {
                    op: BinaryOp::Add,
                    left,
                    right,
                } => self.linear(left)?.add(self.linear(right)?)?,
                App::Binary {
                    op: BinaryOp::Sub,
                    left,
                    right,
                } => {
                    let r = self.linear(right)?;
                    if r.base.is_some() {
                        return None;
                    }
                    self.linear(left)?.add(Linear {
                        base: None,
                        offset: r.offset.wrapping_neg(),
                    })?
                }
                _ => return None,
            },
            _ => return None,
        };
        Some(lin.masked(width))
    }
}

/// Entry register value plus a constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Linear {
    pub base: Option<Reg>,
    pub offset: u64,
}

impl Linear {
    fn add(self, other: Self) -> Option<Self> {
        let base = match (self.base, other.base) {
            (Some(_), Some(_)) => return None,
            (a, b) => a.or(b),
        };
        Some(Self {
            base,
            offset: self.offset.wrapping_add(other.offset),
        })
    }

    const fn masked(self, width: u16) -> Self {
        Self {
            base: self.base,
            offset: self.offset & mask(width),
        }
    }
}

/// A memory slot relative to a register's entry value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StackSlot {
    pub base: Reg,
    pub offset: i64,
}

/// Abstract evaluation of an architecture primitive from its arguments'
/// abstract values. `None` means the primitive is opaque.
pub type PrimEval = fn(&ArchPrim, &[AbsValue]) -> Option<AbsValue>;

/// Tracks where the entry return address can flow: the seeded slots,
/// registers holding it, masking of its low bits and primitives that pass
/// it through.
#[derive(Debug)]
pub struct SentinelDomain<'a> {
    defs: &'a Definitions,
    slots: FxHashSet<Linear>,
    eval_prim: Option<PrimEval>,
}

impl<'a> SentinelDomain<'a> {
    /// Build a domain over `defs`. Seeded slots overwritten with anything
    /// else are forgotten.
    pub fn new(
        defs: &'a Definitions,
        seeds: &[StackSlot],
        addr_width: u16,
        eval_prim: Option<PrimEval>,
    ) -> Self {
        let mut domain = Self {
            defs,
            slots: FxHashSet::default(),
            eval_prim,
        };
        for seed in seeds {
            domain.slots.insert(
                Linear {
                    base: Some(seed.base),
                    offset: seed.offset as u64,
                }
                .masked(addr_width),
            );
        }
        for (addr, value) in defs.writes() {
            if let Some(slot) = defs.linear(addr) {
                if domain.transfer_value(value) != AbsValue::ReturnAddr {
                    domain.slots.remove(&slot);
                }
            }
        }
        domain
    }

    fn is_return_slot(&self, addr: &Value) -> bool {
        self.defs
            .linear(addr)
            .is_some_and(|slot| self.slots.contains(&slot))
    }
}

impl AbstractState for SentinelDomain<'_> {
    fn transfer_value(&self, value: &Value) -> AbsValue {
        let is_ret = match value {
            Value::ReturnAddr { .. } => true,
            Value::Assign { .. } => match self.defs.get(value) {
                Some(AssignRhs::ReadMem { addr, .. }) => self.is_return_slot(addr),
                Some(AssignRhs::App(App::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                })) => {
                    let clears_low_bits = |v: &Value| match (v, v.ty()) {
                        (Value::Bv { value, .. }, Type::Bv(w)) => (!*value & mask(w)) <= 3,
                        _ => false,
                    };
                    (clears_low_bits(right) && self.transfer_value(left) == AbsValue::ReturnAddr)
                        || (clears_low_bits(left)
                            && self.transfer_value(right) == AbsValue::ReturnAddr)
                }
                Some(AssignRhs::Prim(prim)) => self.eval_prim.is_some_and(|eval| {
                    let args: Vec<_> = prim.args.iter().map(|a| self.transfer_value(a)).collect();
                    eval(prim, &args) == Some(AbsValue::ReturnAddr)
                }),
                _ => false,
            },
            _ => false,
        };
        if is_ret {
            AbsValue::ReturnAddr
        } else {
            AbsValue::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use cfr_ir::{Assignment, ExtOp};

    use super::*;

    const SP: Reg = Reg(1);

    fn sp() -> Value {
        Value::Initial {
            reg: SP,
            ty: Type::Bv(64),
        }
    }

    fn r(id: u64) -> Value {
        Value::Assign {
            id: AssignId(id),
            ty: Type::Bv(64),
        }
    }

    fn assign(id: u64, rhs: AssignRhs) -> Stmt {
        Stmt::Assign(Assignment {
            id: AssignId(id),
            rhs,
            ty: Type::Bv(64),
        })
    }

    fn bin(op: BinaryOp, left: Value, right: Value) -> AssignRhs {
        AssignRhs::App(App::Binary { op, left, right })
    }

    #[test]
    fn test_linear_through_push_pop() {
        let stmts = vec![
            assign(0, bin(BinaryOp::Sub, sp(), Value::bv(64, 8))),
            assign(1, bin(BinaryOp::Add, r(0), Value::bv(64, 8))),
        ];
        let defs = Definitions::from_stmts(&stmts);
        assert_eq!(
            defs.linear(&r(1)),
            Some(Linear {
                base: Some(SP),
                offset: 0
            })
        );
        assert_eq!(
            defs.linear(&r(0)),
            Some(Linear {
                base: Some(SP),
                offset: 0u64.wrapping_sub(8)
            })
        );
    }

    #[test]
    fn test_seeded_slot_read() {
        let stmts = vec![assign(0, AssignRhs::ReadMem { addr: sp(), bytes: 8 })];
        let defs = Definitions::from_stmts(&stmts);
        let seeds = [StackSlot { base: SP, offset: 0 }];
        let domain = SentinelDomain::new(&defs, &seeds, 64, None);
        assert_eq!(domain.transfer_value(&r(0)), AbsValue::ReturnAddr);

        let unseeded = SentinelDomain::new(&defs, &[], 64, None);
        assert_eq!(unseeded.transfer_value(&r(0)), AbsValue::Other);
    }

    #[test]
    fn test_overwritten_slot_forgotten() {
        let stmts = vec![
            Stmt::WriteMem {
                addr: sp(),
                value: Value::bv(64, 0x1234),
            },
            assign(0, AssignRhs::ReadMem { addr: sp(), bytes: 8 }),
        ];
        let defs = Definitions::from_stmts(&stmts);
        let domain = SentinelDomain::new(&defs, &[StackSlot { base: SP, offset: 0 }], 64, None);
        assert_eq!(domain.transfer_value(&r(0)), AbsValue::Other);
    }

    #[test]
    fn test_low_bit_mask() {
        let ret = Value::ReturnAddr { width: 64 };
        let stmts = vec![
            assign(0, bin(BinaryOp::And, ret.clone(), Value::bv(64, !1))),
            assign(1, bin(BinaryOp::And, ret, Value::bv(64, 0xff))),
        ];
        let defs = Definitions::from_stmts(&stmts);
        let domain = SentinelDomain::new(&defs, &[], 64, None);
        assert_eq!(domain.transfer_value(&r(0)), AbsValue::ReturnAddr);
        assert_eq!(domain.transfer_value(&r(1)), AbsValue::Other);
    }

    #[test]
    fn test_prim_passthrough() {
        let prim = ArchPrim::pure(
            "passthrough",
            vec![Value::ReturnAddr { width: 64 }],
            Type::Bv(64),
        );
        let stmts = vec![assign(0, AssignRhs::Prim(prim))];
        let defs = Definitions::from_stmts(&stmts);
        let eval: PrimEval = |_, args| args.first().copied();
        let with_hook = SentinelDomain::new(&defs, &[], 64, Some(eval));
        assert_eq!(with_hook.transfer_value(&r(0)), AbsValue::ReturnAddr);
        let without = SentinelDomain::new(&defs, &[], 64, None);
        assert_eq!(without.transfer_value(&r(0)), AbsValue::Other);
    }

    #[test]
    fn test_width_changes_not_followed() {
        let stmts = vec![assign(
            0,
            AssignRhs::App(App::Ext {
                op: ExtOp::Uext,
                arg: Value::ReturnAddr { width: 32 },
                width: 64,
            }),
        )];
        let defs = Definitions::from_stmts(&stmts);
        let domain = SentinelDomain::new(&defs, &[], 64, None);
        assert_eq!(domain.transfer_value(&r(0)), AbsValue::Other);
    }

    #[test]
    fn test_conservative_bounds() {
        let bounds = ConservativeBounds;
        assert_eq!(bounds.feasibility(&Value::Bool(true)), Feasibility::TrueOnly);
        assert_eq!(bounds.feasibility(&Value::Bool(false)), Feasibility::FalseOnly);
        let cond = Value::Assign {
            id: AssignId(3),
            ty: Type::Bool,
        };
        assert_eq!(bounds.feasibility(&cond), Feasibility::Both);
    }
}
