//! Conditional returns.
//!
//! Targets with predicated returns (ARM `bxeq lr`, PowerPC `beqlr`) end a
//! block with the instruction pointer selected between the return address
//! and the next instruction.

use tracing::trace;

use crate::classifier::BlockClassifier;
use crate::context::ClassifyContext;
use crate::domain::{AbsValue, Feasibility};
use crate::parsed::{ParsedBlock, ParsedTerminator};
use crate::standard::ip_mux;
use crate::{ClassifyError, Result};

/// Recognizes `ip = cond ? return_addr : next` and its mirror image.
pub struct ConditionalReturnClassifier;

impl BlockClassifier for ConditionalReturnClassifier {
    fn name(&self) -> &'static str {
        "conditional_return"
    }

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>> {
        let Some((cond, on_true, on_false)) = ip_mux(ctx) else {
            return Ok(None);
        };
        let abs = ctx.env.abs;
        let true_ret = abs.transfer_value(on_true) == AbsValue::ReturnAddr;
        let false_ret = abs.transfer_value(on_false) == AbsValue::ReturnAddr;
        let (returns_when, other) = match (true_ret, false_ret) {
            (true, false) => (true, on_false),
            (false, true) => (false, on_true),
            (true, true) => {
                trace!(addr = ctx.block_addr, "both arms return; unsupported");
                return Ok(None);
            }
            (false, false) => return Ok(None),
        };
        let Some(fallthrough) = ctx.address_of(other) else {
            trace!(addr = ctx.block_addr, "symbolic fallthrough; unsupported");
            return Ok(None);
        };
        if !ctx.env.mem.is_executable(fallthrough) {
            return Err(ClassifyError::NotExecutable { addr: fallthrough });
        }
        match ctx.env.bounds.feasibility(cond) {
            Feasibility::Both => {}
            feasibility => return Err(ClassifyError::InfeasibleBranch { feasibility }),
        }
        let term = ParsedTerminator::ConditionalReturn {
            regs: ctx.regs.clone(),
            cond: cond.clone(),
            returns_when,
            fallthrough,
        };
        Ok(Some(
            ctx.parsed(ctx.stmts.to_vec(), term)
                .with_successors(vec![fallthrough]),
        ))
    }
}
