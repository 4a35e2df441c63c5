//! Disassembly driver.

use cfr_ir::{
    ArchDescriptor, AssignIdSource, Block, BlockSeq, Generator, IrError, MemoryImage, RegState,
    Stmt, Terminator,
};
use metrics::counter;
use tracing::{debug, trace_span};

use crate::InstructionSemantics;

/// Naming state of one discovery unit. Assignment ids and block indices
/// stay unique across every disassembly run that shares it.
#[derive(Debug, Default)]
pub struct UnitState {
    pub ids: AssignIdSource,
    pub blocks: BlockSeq,
}

impl UnitState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Disassembly configuration.
#[derive(Clone, Debug)]
pub struct DisassembleConfig {
    /// Instructions after which a block is cut even if control falls through.
    pub max_instructions_per_block: usize,
}

impl Default for DisassembleConfig {
    fn default() -> Self {
        Self {
            max_instructions_per_block: 256,
        }
    }
}

impl DisassembleConfig {
    #[must_use]
    pub const fn with_max_instructions(mut self, max: usize) -> Self {
        self.max_instructions_per_block = max;
        self
    }
}

/// Blocks produced from one start address.
#[derive(Clone, Debug)]
pub struct DisassembleOutput {
    /// Finished blocks ordered by index.
    pub blocks: Vec<Block>,
    /// Literal executable addresses the final instruction pointers refer to.
    pub next_addrs: Vec<u64>,
    /// Decode failure that ended the run, if any.
    pub decode_error: Option<IrError>,
}

/// Decode instructions from `addr` until control leaves straight-line code.
///
/// A decode failure discards the failing instruction's partial effects and
/// closes the block with a `TranslateError` terminator; it is reported in
/// the output rather than as an error. Invariant violations are returned.
pub fn disassemble<S: InstructionSemantics + ?Sized>(
    arch: &ArchDescriptor,
    semantics: &S,
    mem: &MemoryImage,
    unit: &mut UnitState,
    addr: u64,
    regs: RegState,
    config: &DisassembleConfig,
) -> cfr_ir::Result<DisassembleOutput> {
    let _span = trace_span!("disassemble", addr).entered();
    let mut decode_error = None;
    {
        let mut generator =
            Generator::new(arch, mem, &mut unit.ids, &mut unit.blocks, addr, regs);
        let mut pc = addr;
        let mut count = 0usize;
        loop {
            generator.set_instr_addr(pc);
            let checkpoint = generator.checkpoint();
            match step(&mut generator, semantics, mem, pc) {
                Ok(size) => {
                    count += 1;
                    if !generator.is_open() {
                        break;
                    }
                    let next = pc.wrapping_add(u64::from(size));
                    let falls_through = generator.get_register(arch.ip)? == arch.addr(next);
                    if !falls_through || count >= config.max_instructions_per_block {
                        generator.terminate_block(Terminator::FetchAndExecute)?;
                        break;
                    }
                    pc = next;
                }
                Err(err) if err.is_invariant_violation() => return Err(err),
                Err(err) => {
                    generator.rollback(checkpoint);
                    let reason = match &err {
                        IrError::DecodeFailure { reason, .. } => reason.clone(),
                        IrError::InvariantViolation(v) => v.to_string(),
                    };
                    generator.terminate_block(|regs| Terminator::TranslateError {
                        regs,
                        addr: pc,
                        reason,
                    })?;
                    counter!("cfr_decode_failures_total").increment(1);
                    decode_error = Some(err);
                    break;
                }
            }
        }
    }

    let blocks = unit.blocks.take_finished();
    let next_addrs = blocks
        .iter()
        .filter_map(|b| match &b.term {
            Terminator::FetchAndExecute(regs) => regs.get(arch.ip),
            _ => None,
        })
        .filter_map(|ip| ip.resolve_address(mem))
        .filter(|a| mem.is_executable(*a))
        .collect();
    counter!("cfr_blocks_disassembled_total").increment(blocks.len() as u64);
    debug!(addr, blocks = blocks.len(), failed = decode_error.is_some(), "disassembled");
    Ok(DisassembleOutput {
        blocks,
        next_addrs,
        decode_error,
    })
}

/// Decode and translate one instruction.
fn step<S: InstructionSemantics + ?Sized>(
    generator: &mut Generator<'_>,
    semantics: &S,
    mem: &MemoryImage,
    pc: u64,
) -> cfr_ir::Result<u8> {
    if !mem.is_executable(pc) {
        return Err(IrError::decode(pc, "address is not executable"));
    }
    let bytes = mem
        .bytes_from(pc)
        .map_err(|e| IrError::decode(pc, e.to_string()))?;
    let (instr, size) = semantics
        .decode(bytes, pc)
        .ok_or_else(|| IrError::decode(pc, "invalid instruction"))?;
    generator.emit_statement(Stmt::InstructionStart { addr: pc, size })?;
    semantics.translate(generator, &instr, pc, size)?;
    Ok(size)
}
