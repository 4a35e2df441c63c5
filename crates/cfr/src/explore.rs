//! Function discovery: disassemble, classify, follow successors.

use std::collections::VecDeque;

use cfr_arch::{Architecture, DisassembleConfig, UnitState};
use cfr_cfg::{
    ClassifierChain, ClassifyEnv, ConservativeBounds, Definitions, ParsedBlock, ParsedTerminator,
    SentinelDomain, StackSlot, classify_block,
};
use cfr_ir::{Block, DemandContext, IrError, MemoryImage, RegState, Value, prune_dead_assignments};
use metrics::{counter, histogram};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info_span, trace, warn};

use crate::{Error, Result};

/// Exploration configuration.
#[derive(Clone, Debug)]
pub struct ExploreConfig {
    /// Per-run disassembly options.
    pub disassemble: DisassembleConfig,
    /// Blocks after which a function is reported as truncated.
    pub max_blocks: usize,
    /// Worker threads for [`explore_functions`].
    pub threads: usize,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            disassemble: DisassembleConfig::default(),
            max_blocks: 4096,
            threads: num_cpus::get(),
        }
    }
}

impl ExploreConfig {
    #[must_use]
    pub const fn with_disassemble(mut self, disassemble: DisassembleConfig) -> Self {
        self.disassemble = disassemble;
        self
    }

    #[must_use]
    pub const fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }
}

/// Everything discovered from one function entry.
#[derive(Clone, Debug)]
pub struct DiscoveredFunction {
    pub entry: u64,
    /// Classified blocks in discovery order.
    pub blocks: Vec<ParsedBlock>,
    /// Entries of other functions reached by calls, sorted.
    pub new_functions: Vec<u64>,
    /// Decode failures; each ended one path.
    pub decode_errors: Vec<IrError>,
    /// Exploration stopped at `max_blocks`.
    pub truncated: bool,
}

impl DiscoveredFunction {
    /// Block starting at `addr`, if any.
    pub fn block_at(&self, addr: u64) -> Option<&ParsedBlock> {
        self.blocks.iter().find(|b| b.addr == addr)
    }
}

/// One discovery unit: owns its naming state and explores a single
/// function from its entry.
pub struct FunctionExplorer<'a, A: Architecture> {
    arch: &'a A,
    mem: &'a MemoryImage,
    config: &'a ExploreConfig,
    known_functions: &'a FxHashSet<u64>,
    chain: ClassifierChain,
    demand: DemandContext,
    seeds: Vec<StackSlot>,
    unit: UnitState,
    defs: Definitions,
    visited: FxHashSet<u64>,
    worklist: VecDeque<(u64, RegState)>,
}

impl<'a, A: Architecture> FunctionExplorer<'a, A> {
    pub fn new(
        arch: &'a A,
        mem: &'a MemoryImage,
        config: &'a ExploreConfig,
        known_functions: &'a FxHashSet<u64>,
    ) -> Self {
        let seeds = arch
            .hooks()
            .seed_abs_state
            .map(|seed| seed(arch.descriptor()))
            .unwrap_or_default();
        Self {
            arch,
            mem,
            config,
            known_functions,
            chain: arch.classifiers(),
            demand: arch.demand_context(),
            seeds,
            unit: UnitState::new(),
            defs: Definitions::new(),
            visited: FxHashSet::default(),
            worklist: VecDeque::new(),
        }
    }

    /// Explore the function at `entry`.
    ///
    /// Decode failures end the affected path and are reported in the result.
    /// Invariant violations abort the whole function.
    pub fn explore(mut self, entry: u64) -> Result<DiscoveredFunction> {
        let _span = info_span!("explore", entry).entered();
        if !self.mem.is_executable(entry) {
            return Err(Error::UnmappedEntry(entry));
        }
        self.worklist
            .push_back((entry, self.arch.initial_register_state(entry)));

        let mut blocks = Vec::new();
        let mut new_functions = FxHashSet::default();
        let mut decode_errors = Vec::new();
        let mut truncated = false;

        while let Some((addr, regs)) = self.worklist.pop_front() {
            if !self.visited.insert(addr) {
                continue;
            }
            if blocks.len() >= self.config.max_blocks {
                warn!(entry, max = self.config.max_blocks, "block limit reached");
                truncated = true;
                break;
            }
            let out = self.arch.disassemble(
                self.mem,
                &mut self.unit,
                addr,
                regs,
                &self.config.disassemble,
            )?;
            if let Some(err) = out.decode_error {
                debug!(addr, %err, "path ended by decode failure");
                decode_errors.push(err);
            }
            // Later blocks of one run may use values defined by earlier ones
            for block in &out.blocks {
                self.defs.record(&block.stmts);
            }
            for block in out.blocks {
                let parsed = self.classify(block)?;
                trace!(
                    addr = parsed.addr,
                    kind = parsed.kind().as_str(),
                    successors = parsed.successors.len(),
                    "block parsed"
                );
                self.enqueue_successors(&parsed);
                new_functions.extend(parsed.new_functions.iter().copied());
                blocks.push(parsed);
            }
        }

        new_functions.remove(&entry);
        let mut new_functions: Vec<_> = new_functions.into_iter().collect();
        new_functions.sort_unstable();
        counter!("cfr_functions_explored_total").increment(1);
        let block_count = u32::try_from(blocks.len()).unwrap_or(u32::MAX);
        histogram!("cfr_function_blocks").record(f64::from(block_count));
        debug!(
            entry,
            blocks = blocks.len(),
            calls = new_functions.len(),
            decode_errors = decode_errors.len(),
            truncated,
            "function explored"
        );
        Ok(DiscoveredFunction {
            entry,
            blocks,
            new_functions,
            decode_errors,
            truncated,
        })
    }

    /// Classify, rewrite and prune one block.
    fn classify(&self, block: Block) -> Result<ParsedBlock> {
        let desc = self.arch.descriptor();
        let hooks = self.arch.hooks();
        let abs = SentinelDomain::new(
            &self.defs,
            &self.seeds,
            desc.addr_width,
            hooks.eval_arch_prim,
        );
        let env = ClassifyEnv {
            arch: desc,
            mem: self.mem,
            defs: &self.defs,
            recognizers: self.arch,
            abs: &abs,
            bounds: &ConservativeBounds,
            known_functions: self.known_functions,
        };
        let mut parsed = classify_block(&env, &self.chain, block)?;
        if let Some(rewrite) = hooks.rewrite_block {
            parsed = rewrite(desc, parsed);
        }
        // Arms of an intra-instruction branch read the split block's values
        if !matches!(parsed.term, ParsedTerminator::IntraBranch { .. }) {
            let stmts = std::mem::take(&mut parsed.stmts);
            parsed.stmts =
                prune_dead_assignments(stmts, terminator_roots(&parsed.term), &self.demand);
        }
        Ok(parsed)
    }

    fn enqueue_successors(&mut self, parsed: &ParsedBlock) {
        let Some(regs) = parsed.term.regs() else {
            return;
        };
        let desc = self.arch.descriptor();
        for &succ in &parsed.successors {
            if self.visited.contains(&succ) {
                continue;
            }
            let state = match &parsed.term {
                ParsedTerminator::Call { .. } => self.arch.post_call_regs(&self.defs, regs, succ),
                _ => {
                    let mut state = regs.clone();
                    if let Err(err) = state.set(desc.ip, desc.addr(succ)) {
                        warn!(succ, %err, "cannot redirect successor state");
                        continue;
                    }
                    state
                }
            };
            self.worklist.push_back((succ, state));
        }
    }
}

/// Values a classified block must keep computing.
fn terminator_roots(term: &ParsedTerminator) -> Vec<&Value> {
    let mut roots: Vec<&Value> = term.regs().map_or_else(Vec::new, |regs| {
        regs.iter().map(|(_, value)| value).collect()
    });
    match term {
        ParsedTerminator::Branch { cond, .. }
        | ParsedTerminator::ConditionalReturn { cond, .. }
        | ParsedTerminator::IntraBranch { cond, .. } => roots.push(cond),
        ParsedTerminator::Arch { stmt, .. } => roots.extend(&stmt.args),
        _ => {}
    }
    roots
}

/// Explore every function in `entries` in parallel.
///
/// Each entry gets its own discovery unit; the memory image is shared.
/// Results are returned in entry order, one per entry.
pub fn explore_functions<A: Architecture>(
    arch: &A,
    mem: &MemoryImage,
    entries: &[u64],
    config: &ExploreConfig,
) -> Result<Vec<Result<DiscoveredFunction>>> {
    let known: FxHashSet<u64> = entries.iter().copied().collect();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .build()?;
    debug!(
        arch = arch.descriptor().name,
        functions = entries.len(),
        threads = config.threads,
        "exploring"
    );
    Ok(pool.install(|| {
        entries
            .par_iter()
            .map(|&entry| FunctionExplorer::new(arch, mem, config, &known).explore(entry))
            .collect()
    }))
}
