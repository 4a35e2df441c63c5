//! Blocks and block sequences.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::Violation;
use crate::stmt::Stmt;
use crate::terminator::Terminator;

/// Index of a block within one [`BlockSeq`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(pub u32);

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A finished block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub index: BlockIndex,
    /// Address of the first instruction contributing to this block.
    pub addr: u64,
    pub stmts: Vec<Stmt>,
    pub term: Terminator,
}

impl Block {
    /// Number of decoded instructions in this block.
    pub fn num_instructions(&self) -> usize {
        self.stmts
            .iter()
            .filter(|s| matches!(s, Stmt::InstructionStart { .. }))
            .count()
    }
}

/// Blocks produced while disassembling one address.
///
/// Indices are allocated up front so branch targets can be named before
/// the target blocks exist. Blocks must still finish in index order.
#[derive(Debug, Default)]
pub struct BlockSeq {
    next_index: u32,
    last: Option<BlockIndex>,
    finished: Vec<Block>,
    emitted: FxHashSet<BlockIndex>,
}

impl BlockSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next block index.
    pub const fn alloc_index(&mut self) -> BlockIndex {
        let idx = BlockIndex(self.next_index);
        self.next_index += 1;
        idx
    }

    /// Number of indices allocated so far.
    pub const fn allocated(&self) -> u32 {
        self.next_index
    }

    /// Number of finished blocks.
    pub fn len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }

    /// Append a finished block. Each allocated index is emitted exactly once,
    /// after every lower index.
    pub fn push(&mut self, block: Block) -> Result<(), Violation> {
        if block.index.0 >= self.next_index {
            return Err(Violation::UnallocatedBlock(block.index));
        }
        if self.emitted.contains(&block.index) {
            return Err(Violation::DuplicateBlock(block.index));
        }
        if let Some(last) = self.last.filter(|last| block.index < *last) {
            return Err(Violation::OutOfOrderBlock {
                index: block.index,
                after: last,
            });
        }
        self.emitted.insert(block.index);
        self.last = Some(block.index);
        self.finished.push(block);
        Ok(())
    }

    /// Drop blocks finished after a checkpoint and release later indices.
    pub(crate) fn truncate(&mut self, len: usize, next_index: u32) {
        for block in self.finished.drain(len..) {
            self.emitted.remove(&block.index);
        }
        self.last = self.finished.last().map(|b| b.index);
        self.next_index = next_index;
    }

    /// Take all finished blocks in emission order, which is index order.
    pub fn take_finished(&mut self) -> Vec<Block> {
        std::mem::take(&mut self.finished)
    }
}
