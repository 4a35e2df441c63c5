//! Classifier chain.

use cfr_ir::{Block, Terminator};
use metrics::counter;
use tracing::{debug, trace, trace_span};

use crate::context::{ClassifyContext, ClassifyEnv};
use crate::parsed::{ParsedBlock, ParsedTerminator};
use crate::standard::{
    BranchClassifier, CallClassifier, JumpClassifier, ReturnClassifier, TailCallClassifier,
};
use crate::{ClassifyError, Result};

/// Extension point for block classification.
///
/// Return `Ok(None)` to fall through to the next classifier. An error
/// means the block matched but is inconsistent and must not be guessed at.
pub trait BlockClassifier: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Option<ParsedBlock>>;
}

/// Chains classifiers; tries them in order until one recognizes the block.
pub struct ClassifierChain {
    classifiers: Vec<Box<dyn BlockClassifier>>,
    allow_indirect_fallback: bool,
}

impl ClassifierChain {
    /// Create a chain with the given classifiers.
    pub fn new(classifiers: Vec<Box<dyn BlockClassifier>>) -> Self {
        Self {
            classifiers,
            allow_indirect_fallback: true,
        }
    }

    /// Create a chain with the architecture-independent classifiers.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(BranchClassifier),
            Box::new(CallClassifier),
            Box::new(ReturnClassifier),
            Box::new(TailCallClassifier),
            Box::new(JumpClassifier),
        ])
    }

    /// Standard chain preceded by architecture-specific classifiers.
    pub fn with_arch_classifiers(arch: Vec<Box<dyn BlockClassifier>>) -> Self {
        let mut chain = Self::new(arch);
        chain.classifiers.extend(Self::standard().classifiers);
        chain
    }

    /// Create an empty chain.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Append a classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl BlockClassifier + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Whether unrecognized blocks become indirect jumps.
    #[must_use]
    pub const fn with_indirect_fallback(mut self, allow: bool) -> Self {
        self.allow_indirect_fallback = allow;
        self
    }

    /// Names of the classifiers, in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// Run the chain. First match wins.
    pub fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<ParsedBlock> {
        let _span = trace_span!("classify", addr = ctx.block_addr).entered();
        for classifier in &self.classifiers {
            if let Some(parsed) = classifier.classify(ctx)? {
                debug!(
                    addr = ctx.block_addr,
                    classifier = classifier.name(),
                    kind = parsed.kind().as_str(),
                    "classified"
                );
                return Ok(parsed);
            }
            trace!(classifier = classifier.name(), "declined");
        }
        if self.allow_indirect_fallback {
            debug!(addr = ctx.block_addr, "indirect jump fallback");
            return Ok(ctx.parsed(
                ctx.stmts.to_vec(),
                ParsedTerminator::IndirectJump {
                    regs: ctx.regs.clone(),
                },
            ));
        }
        Err(ClassifyError::NoClassifierMatched {
            tried: self.classifiers.len(),
        })
    }
}

impl Default for ClassifierChain {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify a finished block.
///
/// Blocks ending in `FetchAndExecute` go through the chain; other
/// terminators are carried over directly. A chain that matches nothing
/// yields `ClassifyFailure`.
pub fn classify_block(
    env: &ClassifyEnv<'_>,
    chain: &ClassifierChain,
    block: Block,
) -> Result<ParsedBlock> {
    let Block {
        index,
        addr,
        stmts,
        term,
    } = block;
    let parsed = match term {
        Terminator::FetchAndExecute(regs) => {
            let ctx = ClassifyContext {
                env,
                index,
                block_addr: addr,
                stmts: &stmts,
                regs: &regs,
            };
            match chain.classify(&ctx) {
                Ok(parsed) => parsed,
                Err(err @ ClassifyError::NoClassifierMatched { .. }) => {
                    counter!("cfr_classify_failures_total").increment(1);
                    ParsedBlock::new(
                        index,
                        addr,
                        stmts.clone(),
                        ParsedTerminator::ClassifyFailure {
                            regs: regs.clone(),
                            reason: err.to_string(),
                        },
                    )
                }
                Err(err) => {
                    counter!("cfr_classify_failures_total").increment(1);
                    return Err(err);
                }
            }
        }
        Terminator::Branch {
            cond,
            on_true,
            on_false,
        } => ParsedBlock::new(
            index,
            addr,
            stmts,
            ParsedTerminator::IntraBranch {
                cond,
                on_true,
                on_false,
            },
        ),
        Terminator::TranslateError { regs, addr: at, reason } => ParsedBlock::new(
            index,
            addr,
            stmts,
            ParsedTerminator::TranslateError {
                regs,
                addr: at,
                reason,
            },
        ),
        Terminator::Arch { stmt, regs } => {
            let next = regs
                .get(env.arch.ip)
                .and_then(|ip| ip.resolve_address(env.mem))
                .filter(|a| env.mem.is_executable(*a));
            ParsedBlock::new(index, addr, stmts, ParsedTerminator::Arch { stmt, regs })
                .with_successors(next.into_iter().collect())
        }
    };
    counter!("cfr_blocks_classified_total", "kind" => parsed.kind().as_str()).increment(1);
    Ok(parsed)
}
