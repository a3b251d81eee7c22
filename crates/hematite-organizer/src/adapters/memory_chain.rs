//! In-memory chain store, used by tests and embedders that do not need a
//! database behind the organizer.

use async_trait::async_trait;
use hematite_types::{Block, BlockHeader, Hash, OutPoint, U256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::error::StoreError;
use crate::domain::populate::OutputRecord;
use crate::domain::Fork;
use crate::ports::ChainStore;

struct Inner {
    /// Confirmed blocks, index is height.
    chain: Vec<Arc<Block>>,
    /// Hash to height lookup for the confirmed chain.
    heights: HashMap<Hash, u64>,
    /// Session flush lock.
    writes_locked: bool,
    /// Number of per-reorganization flushes requested.
    flushes: u64,
}

/// A main chain held entirely in memory.
pub struct InMemoryChainStore {
    inner: RwLock<Inner>,
}

impl InMemoryChainStore {
    /// A store confirmed up to `genesis` at height zero.
    pub fn new(genesis: Arc<Block>) -> Self {
        let mut heights = HashMap::new();
        heights.insert(genesis.hash(), 0);
        Self {
            inner: RwLock::new(Inner {
                chain: vec![genesis],
                heights,
                writes_locked: false,
                flushes: 0,
            }),
        }
    }

    /// Height of the confirmed top.
    pub fn top_height(&self) -> u64 {
        (self.inner.read().chain.len() as u64).saturating_sub(1)
    }

    /// Confirmed block at `height`.
    pub fn block_at_height(&self, height: u64) -> Option<Arc<Block>> {
        self.inner.read().chain.get(height as usize).cloned()
    }

    /// True while the session flush lock is held.
    pub fn writes_locked(&self) -> bool {
        self.inner.read().writes_locked
    }

    /// Per-reorganization flushes performed so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.read().flushes
    }
}

#[async_trait]
impl ChainStore for InMemoryChainStore {
    fn block_exists(&self, hash: &Hash) -> bool {
        self.inner.read().heights.contains_key(hash)
    }

    fn height_of(&self, hash: &Hash) -> Option<u64> {
        self.inner.read().heights.get(hash).copied()
    }

    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        self.inner
            .read()
            .chain
            .get(height as usize)
            .map(|block| block.header)
    }

    fn transaction_exists(&self, hash: &Hash) -> bool {
        self.inner
            .read()
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .any(|tx| tx.hash() == *hash)
    }

    fn is_spent(&self, outpoint: &OutPoint) -> bool {
        self.inner
            .read()
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .flat_map(|tx| tx.inputs.iter())
            .any(|input| input.previous_output == *outpoint)
    }

    fn output_record(&self, outpoint: &OutPoint) -> Option<OutputRecord> {
        let inner = self.inner.read();
        // Newest block first, so a later duplicate shadows an earlier
        // one.
        for (height, block) in inner.chain.iter().enumerate().rev() {
            for (position, tx) in block.transactions.iter().enumerate() {
                if tx.hash() == outpoint.hash && (outpoint.index as usize) < tx.outputs.len() {
                    return Some(OutputRecord {
                        output: tx.outputs[outpoint.index as usize].clone(),
                        height: height as u64,
                        coinbase: position == 0,
                    });
                }
            }
        }
        None
    }

    fn fork_work(&self, maximum: &U256, first_height: u64) -> Result<U256, StoreError> {
        let inner = self.inner.read();
        let mut total = U256::zero();

        for block in inner.chain.iter().skip(first_height as usize) {
            total = total.saturating_add(block.header.work());
            // The caller only needs to know whether the maximum is
            // exceeded.
            if total > *maximum {
                break;
            }
        }

        Ok(total)
    }

    async fn reorganize(&self, fork: &Fork, flush: bool) -> Result<Vec<Arc<Block>>, StoreError> {
        let mut inner = self.inner.write();

        let fork_height = fork.height();
        let anchored = inner
            .chain
            .get(fork_height as usize)
            .map_or(false, |point| point.hash() == fork.hash());
        if !anchored {
            return Err(StoreError::InvalidForkPoint);
        }

        let first = (fork_height as usize).saturating_add(1);
        let outgoing = inner.chain.split_off(first);
        for block in &outgoing {
            inner.heights.remove(&block.hash());
        }

        for (index, block) in fork.blocks().iter().enumerate() {
            let height = fork_height
                .saturating_add(index as u64)
                .saturating_add(1);
            inner.heights.insert(block.hash(), height);
            inner.chain.push(Arc::clone(block));
        }

        if flush {
            inner.flushes += 1;
        }

        Ok(outgoing)
    }

    fn begin_writes(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.writes_locked {
            return false;
        }
        inner.writes_locked = true;
        true
    }

    fn end_writes(&self) -> bool {
        let mut inner = self.inner.write();
        if !inner.writes_locked {
            return false;
        }
        inner.writes_locked = false;
        true
    }
}
