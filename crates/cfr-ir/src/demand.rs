//! Demand analysis over a block's statements.
//!
//! Removes assignments whose results are never used, keeping everything
//! with an observable effect. Architectures decide which of their own
//! statements and primitives have effects through a [`DemandContext`].

use rustc_hash::FxHashSet;

use crate::stmt::{ArchPrim, ArchStmt, AssignRhs, Stmt};
use crate::value::{AssignId, Value};

/// Side-effect classification for architecture-specific statements.
#[derive(Clone, Copy, Debug)]
pub struct DemandContext {
    pub arch_stmt_effectful: fn(&ArchStmt) -> bool,
    pub arch_prim_effectful: fn(&ArchPrim) -> bool,
}

impl Default for DemandContext {
    fn default() -> Self {
        Self {
            arch_stmt_effectful: |_| true,
            arch_prim_effectful: |prim| !prim.pure,
        }
    }
}

impl DemandContext {
    /// Check if a statement must be kept regardless of demand.
    pub fn has_effect(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Assign(a) => match &a.rhs {
                AssignRhs::App(_) => false,
                AssignRhs::ReadMem { .. } => true,
                AssignRhs::Prim(prim) => (self.arch_prim_effectful)(prim),
            },
            Stmt::WriteMem { .. } | Stmt::InstructionStart { .. } | Stmt::Comment(_) => true,
            Stmt::Arch(stmt) => (self.arch_stmt_effectful)(stmt),
        }
    }
}

/// Drop assignments not reachable from `roots` or from a kept statement.
pub fn prune_dead_assignments<'v>(
    stmts: Vec<Stmt>,
    roots: impl IntoIterator<Item = &'v Value>,
    ctx: &DemandContext,
) -> Vec<Stmt> {
    let mut demanded: FxHashSet<AssignId> = roots.into_iter().filter_map(Value::as_assign).collect();
    let mut keep = vec![false; stmts.len()];

    for (i, stmt) in stmts.iter().enumerate().rev() {
        let live = match stmt {
            Stmt::Assign(a) => demanded.contains(&a.id) || ctx.has_effect(stmt),
            _ => ctx.has_effect(stmt),
        };
        if !live {
            continue;
        }
        keep[i] = true;
        for value in uses(stmt) {
            if let Some(id) = value.as_assign() {
                demanded.insert(id);
            }
        }
    }

    stmts
        .into_iter()
        .zip(keep)
        .filter_map(|(stmt, kept)| kept.then_some(stmt))
        .collect()
}

fn uses(stmt: &Stmt) -> Vec<&Value> {
    match stmt {
        Stmt::Assign(a) => a.rhs.operands(),
        Stmt::WriteMem { addr, value } => vec![addr, value],
        Stmt::Arch(stmt) => stmt.args.iter().collect(),
        Stmt::InstructionStart { .. } | Stmt::Comment(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{App, BinaryOp};
    use crate::stmt::Assignment;
    use crate::value::Type;

    fn add(id: u64, left: Value, right: Value) -> Stmt {
        Stmt::Assign(Assignment {
            id: AssignId(id),
            rhs: AssignRhs::App(App::Binary {
                op: BinaryOp::Add,
                left,
                right,
            }),
            ty: Type::Bv(32),
        })
    }

    fn r(id: u64) -> Value {
        Value::Assign {
            id: AssignId(id),
            ty: Type::Bv(32),
        }
    }

    #[test]
    fn test_unused_assignment_removed() {
        let stmts = vec![
            add(0, Value::bv(32, 1), r(9)),
            add(1, r(0), Value::bv(32, 2)),
            add(2, Value::bv(32, 3), r(9)),
        ];
        let root = r(1);
        let kept = prune_dead_assignments(stmts, [&root], &DemandContext::default());
        let ids: Vec<_> = kept
            .iter()
            .filter_map(|s| s.as_assignment().map(|a| a.id))
            .collect();
        assert_eq!(ids, vec![AssignId(0), AssignId(1)]);
    }

    #[test]
    fn test_effects_kept() {
        let stmts = vec![
            add(0, Value::bv(32, 1), r(9)),
            Stmt::WriteMem {
                addr: Value::bv(32, 0x100),
                value: r(0),
            },
            Stmt::Assign(Assignment {
                id: AssignId(1),
                rhs: AssignRhs::Prim(ArchPrim::effectful("rdtsc", Vec::new(), Type::Bv(64))),
                ty: Type::Bv(64),
            }),
            Stmt::Assign(Assignment {
                id: AssignId(2),
                rhs: AssignRhs::Prim(ArchPrim::pure("parity", vec![r(9)], Type::Bool)),
                ty: Type::Bool,
            }),
            Stmt::Arch(ArchStmt::new("fence", Vec::new())),
        ];
        let kept = prune_dead_assignments(stmts, [], &DemandContext::default());
        assert_eq!(kept.len(), 4);
        assert!(
            !kept
                .iter()
                .any(|s| s.as_assignment().is_some_and(|a| a.id == AssignId(2)))
        );
    }

    #[test]
    fn test_custom_context() {
        let ctx = DemandContext {
            arch_stmt_effectful: |stmt| stmt.name != "hint",
            ..DemandContext::default()
        };
        let stmts = vec![
            Stmt::Arch(ArchStmt::new("hint", Vec::new())),
            Stmt::Arch(ArchStmt::new("fence", Vec::new())),
        ];
        let kept = prune_dead_assignments(stmts, [], &ctx);
        assert_eq!(kept, vec![Stmt::Arch(ArchStmt::new("fence", Vec::new()))]);
    }
}
