//! Architecture-independent classifiers.

use cfr_ir::{App, TernaryOp, Value};

use crate::Result;
use crate::classifier::BlockClassifier;
use crate::context::ClassifyContext;
use crate::parsed::{ParsedBlock, ParsedTerminator};

/// Instruction pointer defined by a select: `(cond, on_true, on_false)`.
pub fn ip_mux<'c>(ctx: &'c ClassifyContext<'_>) -> Option<(&'c Value, &'c Value, &'c Value)> {
    match ctx.env.defs.app(ctx.ip()?)? {
        App::Ternary {
            op: TernaryOp::Select,
            first,
            second,
            third,
        } => Some((first, second, third)),
        _ => None,
    }
}

/// Two-way branch between executable literal addresses.
pub struct BranchClassifier;

impl BlockClassifier for BranchClassifier {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let Some((cond, on_true, on_false)) = ip_mux(ctx) else {
            return Ok(None);
        };
        let (Some(true_target), Some(false_target)) = (
            ctx.executable_address(on_true),
            ctx.executable_address(on_false),
        ) else {
            return Ok(None);
        };
        let term = ParsedTerminator::Branch {
            regs: ctx.regs.clone(),
            cond: cond.clone(),
            true_target,
            false_target,
        };
        Ok(Some(
            ctx.parsed(ctx.stmts.to_vec(), term)
                .with_successors(vec![true_target, false_target]),
        ))
    }
}

/// Call recognized by the architecture.
pub struct CallClassifier;

impl BlockClassifier for CallClassifier {
    fn name(&self) -> &'static str {
        "call"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let Some((stmts, return_addr)) =
            ctx.env
                .recognizers
                .identify_call(ctx.env.mem, ctx.stmts, ctx.regs)
        else {
            return Ok(None);
        };
        let callee = ctx.ip().and_then(|ip| ctx.executable_address(ip));
        let successors = Some(return_addr)
            .filter(|a| ctx.env.mem.is_executable(*a))
            .into_iter()
            .collect();
        let term = ParsedTerminator::Call {
            regs: ctx.regs.clone(),
            return_addr: Some(return_addr),
        };
        Ok(Some(
            ctx.parsed(stmts, term)
                .with_successors(successors)
                .with_new_functions(callee.into_iter().collect()),
        ))
    }
}

/// Return recognized by the architecture.
pub struct ReturnClassifier;

impl BlockClassifier for ReturnClassifier {
    fn name(&self) -> &'static str {
        "return"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let stmts = ctx
            .env
            .recognizers
            .identify_return(ctx.stmts, ctx.regs, ctx.env.abs);
        Ok(stmts.map(|stmts| {
            ctx.parsed(
                stmts,
                ParsedTerminator::Return {
                    regs: ctx.regs.clone(),
                },
            )
        }))
    }
}

/// Jump to a known function entry with the stack back at its entry value.
pub struct TailCallClassifier;

impl BlockClassifier for TailCallClassifier {
    fn name(&self) -> &'static str {
        "tail_call"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let Some(target) = ctx.ip().and_then(|ip| ctx.executable_address(ip)) else {
            return Ok(None);
        };
        if !ctx.env.known_functions.contains(&target) || !ctx.stack_at_entry() {
            return Ok(None);
        }
        Ok(Some(ctx.parsed(
            ctx.stmts.to_vec(),
            ParsedTerminator::TailCall {
                regs: ctx.regs.clone(),
            },
        )))
    }
}

/// Jump to a single executable literal address.
pub struct JumpClassifier;

impl BlockClassifier for JumpClassifier {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let Some(target) = ctx.ip().and_then(|ip| ctx.executable_address(ip)) else {
            return Ok(None);
        };
        let term = ParsedTerminator::Jump {
            regs: ctx.regs.clone(),
            target,
        };
        Ok(Some(
            ctx.parsed(ctx.stmts.to_vec(), term)
                .with_successors(vec![target]),
        ))
    }
}
