//! # Fork Segment
//!
//! A contiguous chain segment descending from a known block of the
//! persistent chain. The segment carries the chain queries needed to
//! validate its top block in context: header fields by height, claimed
//! work, and the fork-local duplicate/spend/prevout scans.
//!
//! A fork is assembled tip-first: the organizer walks ancestors upward
//! from the arriving block and each ancestor becomes the new front, with
//! linkage checked against the existing front. Front is the fork point
//! plus one, back is the fork top.

use hematite_types::{Block, Hash, OutPoint, Transaction, NULL_HASH, U256};
use std::sync::Arc;

use super::populate::{PrevoutMeta, SpendMeta, TxMeta};

/// An ordered run of candidate blocks above a confirmed parent.
///
/// Not thread safe; the organizer guarantees a single owner per attempt.
#[derive(Clone, Debug)]
pub struct Fork {
    /// Height of the confirmed block immediately below the segment.
    height: u64,
    /// The chain of blocks in the fork.
    blocks: Vec<Arc<Block>>,
}

impl Fork {
    /// An empty fork anchored at height zero.
    pub fn new() -> Self {
        Self {
            height: 0,
            // The common case is a single new block on the chain top.
            blocks: Vec::with_capacity(1),
        }
    }

    /// Set the height of the fork point. The caller matches it to the
    /// fork-point hash.
    pub fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    /// Prepend `block`, true when the fork is empty or the current front
    /// links back to it.
    pub fn push_front(&mut self, block: Arc<Block>) -> bool {
        let linked = self
            .blocks
            .first()
            .map_or(true, |front| front.header.previous_block_hash == block.hash());

        if linked {
            self.blocks.insert(0, block);
        }

        linked
    }

    /// The hash of the fork point, or the null hash when empty.
    pub fn hash(&self) -> Hash {
        self.blocks
            .first()
            .map_or(NULL_HASH, |front| front.header.previous_block_hash)
    }

    /// The height of the fork point.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// The top block of the fork, if it exists.
    pub fn top(&self) -> Option<&Arc<Block>> {
        self.blocks.last()
    }

    /// The confirmed height the top block would take, zero when empty.
    pub fn top_height(&self) -> u64 {
        if self.blocks.is_empty() {
            0
        } else {
            self.height.saturating_add(self.size())
        }
    }

    /// Read-only view of the member blocks.
    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn size(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// The fork index of the block at the given blockchain height.
    /// Callers ensure the height is above the fork point.
    pub fn index_of(&self, height: u64) -> u64 {
        height.saturating_sub(self.height).saturating_sub(1)
    }

    /// The blockchain height of the block at the given fork index.
    /// The index is unguarded; callers verify it.
    pub fn height_at(&self, index: u64) -> u64 {
        self.height.saturating_add(index).saturating_add(1)
    }

    /// The block at the given fork index.
    pub fn block_at(&self, index: u64) -> Option<&Arc<Block>> {
        self.blocks.get(index as usize)
    }

    /// The bits of the block at the given height in the fork.
    pub fn get_bits(&self, height: u64) -> Option<u32> {
        self.block_above(height).map(|block| block.header.bits)
    }

    /// The version of the block at the given height in the fork.
    pub fn get_version(&self, height: u64) -> Option<u32> {
        self.block_above(height).map(|block| block.header.version)
    }

    /// The timestamp of the block at the given height in the fork.
    pub fn get_timestamp(&self, height: u64) -> Option<u32> {
        self.block_above(height).map(|block| block.header.timestamp)
    }

    /// The hash of the block at the given height, if it is in the fork.
    pub fn get_block_hash(&self, height: u64) -> Option<Hash> {
        self.block_above(height).map(|block| block.hash())
    }

    fn block_above(&self, height: u64) -> Option<&Arc<Block>> {
        if height <= self.height {
            return None;
        }
        self.block_at(self.index_of(height))
    }

    /// Total claimed work of the segment.
    ///
    /// Claimed work must exceed the competing confirmed segment before
    /// any expensive validation runs, which also bounds the store work a
    /// low-effort branch can trigger. Whether the claimed work was
    /// actually expended is established afterwards, block by block.
    pub fn difficulty(&self) -> U256 {
        self.blocks
            .iter()
            .fold(U256::zero(), |total, block| {
                total.saturating_add(block.header.work())
            })
    }

    /// Duplicate-transaction scan across the fork.
    ///
    /// Counting every occurrence, the transaction under validation
    /// included, is simpler than excluding self with early termination.
    pub fn populate_tx(&self, tx: &Transaction) -> TxMeta {
        let hash = tx.hash();
        let count = self
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|candidate| candidate.hash() == hash)
            .count();

        debug_assert!(count >= 1, "transaction under validation is in the fork");
        TxMeta {
            duplicate: count > 1,
        }
    }

    /// Spend scan for one outpoint across the fork. The count includes
    /// the spending input itself.
    pub fn populate_spent(&self, outpoint: &OutPoint) -> SpendMeta {
        let spends = self
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .flat_map(|tx| tx.inputs.iter())
            .filter(|input| input.previous_output == *outpoint)
            .count();

        debug_assert!(spends >= 1, "input under validation is in the fork");
        let spent = spends > 1;
        SpendMeta {
            spent,
            confirmed: spent,
        }
    }

    /// Resolve one previous output within the fork.
    ///
    /// Blocks are scanned newest first so a later duplicate transaction
    /// shadows an earlier one.
    pub fn populate_prevout(&self, outpoint: &OutPoint) -> PrevoutMeta {
        let mut meta = PrevoutMeta::default();

        // A coinbase input has no prevout to resolve.
        if outpoint.is_null() {
            return meta;
        }

        for index in (0..self.blocks.len()).rev() {
            let block = &self.blocks[index];
            for (position, tx) in block.transactions.iter().enumerate() {
                if tx.hash() == outpoint.hash && (outpoint.index as usize) < tx.outputs.len() {
                    meta.cache = Some(tx.outputs[outpoint.index as usize].clone());
                    // Height is recorded only for coinbase prevouts;
                    // maturity rules key off it.
                    if position == 0 {
                        meta.height = Some(self.height_at(index as u64));
                    }
                    return meta;
                }
            }
        }

        meta
    }
}

impl Default for Fork {
    fn default() -> Self {
        Self::new()
    }
}
