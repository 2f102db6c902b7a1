//! # Chain Table
//!
//! One [`Link`] per data block. A file or directory owns a singly linked
//! chain of blocks starting at its first block; the table only records where
//! each chain goes next.
//!
//! Allocation is a linear scan from block 1. Block 0 is reserved so that a
//! zeroed index can never be mistaken for a real block.

use core::fmt;

use crate::config::BLOCK_COUNT;
use crate::errors::{FsError, FsResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u16);

impl BlockId {
    /// Returns `None` for the reserved block and anything out of range.
    pub const fn new(index: usize) -> Option<Self> {
        if index == 0 || index >= BLOCK_COUNT {
            None
        } else {
            Some(Self(index as u16))
        }
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    Free,
    /// In use, last block of its chain
    Terminal,
    /// In use, chain continues at the given block
    Next(BlockId),
}

impl Link {
    pub fn is_free(self) -> bool {
        self == Link::Free
    }
}

pub struct ChainTable {
    links: [Link; BLOCK_COUNT],
    used: usize,
}

impl ChainTable {
    pub const fn new() -> Self {
        Self {
            links: [Link::Free; BLOCK_COUNT],
            used: 0,
        }
    }

    pub fn reset(&mut self) {
        self.links = [Link::Free; BLOCK_COUNT];
        self.used = 0;
    }

    pub fn allocate(&mut self) -> FsResult<BlockId> {
        let index = self.links[1..]
            .iter()
            .position(|link| link.is_free())
            .map(|pos| pos + 1)
            .ok_or(FsError::NoSpace)?;

        self.links[index] = Link::Terminal;
        self.used += 1;
        BlockId::new(index).ok_or(FsError::Corrupted)
    }

    /// Appends `next` after `tail`, which must be the end of a chain.
    pub fn link(&mut self, tail: BlockId, next: BlockId) {
        self.links[tail.as_usize()] = Link::Next(next);
    }

    pub fn get(&self, block: BlockId) -> Link {
        self.links[block.as_usize()]
    }

    pub fn next(&self, block: BlockId) -> Option<BlockId> {
        match self.get(block) {
            Link::Next(next) => Some(next),
            Link::Free | Link::Terminal => None,
        }
    }

    /// Walks the chain from `first`, returning every block to the free pool.
    /// Returns how many blocks were freed.
    pub fn free_chain(&mut self, first: BlockId) -> usize {
        let mut block = Some(first);
        let mut freed = 0;

        while let Some(current) = block {
            if freed >= BLOCK_COUNT {
                log::error!("chain starting at {} did not terminate, stopped freeing", first);
                break;
            }

            let link = self.links[current.as_usize()];
            if link.is_free() {
                break;
            }
            self.links[current.as_usize()] = Link::Free;
            self.used -= 1;
            freed += 1;

            block = match link {
                Link::Next(next) => Some(next),
                Link::Free | Link::Terminal => None,
            };
        }
        freed
    }

    pub fn chain(&self, first: Option<BlockId>) -> Chain<'_> {
        Chain {
            table: self,
            block: first,
            remaining: BLOCK_COUNT,
        }
    }

    /// Last block of the chain starting at `first`.
    pub fn last(&self, first: BlockId) -> BlockId {
        self.chain(Some(first)).last().unwrap_or(first)
    }

    pub fn used_blocks(&self) -> usize {
        self.used
    }

    /// Allocatable blocks not in use. Block 0 is not counted.
    pub fn free_blocks(&self) -> usize {
        BLOCK_COUNT - 1 - self.used
    }

    /// Recounts used blocks from scratch.
    pub fn scan_used(&self) -> usize {
        self.links.iter().filter(|link| !link.is_free()).count()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

impl Default for ChainTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward walk over a chain, bounded to `BLOCK_COUNT` steps.
pub struct Chain<'a> {
    table: &'a ChainTable,
    block: Option<BlockId>,
    remaining: usize,
}

impl Iterator for Chain<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let block = self.block?;
        self.block = self.table.next(block);
        Some(block)
    }
}
