//! Driven ports (outbound dependencies)
//!
//! The persistent store, the candidate pool, and the validators the
//! organizer drives. Store access is limited to: existence and height
//! lookups, header history, fork-work summation, the reorganization swap
//! and the flush lock, plus the populator queries (transaction exists,
//! spend, output).

use async_trait::async_trait;
use hematite_types::{Block, BlockHeader, Hash, OutPoint, Transaction, U256};
use std::sync::Arc;

use crate::domain::error::{OrganizeResult, StoreError};
use crate::domain::populate::OutputRecord;
use crate::domain::Fork;

/// The persistent chain store.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// True when `hash` names a stored block.
    fn block_exists(&self, hash: &Hash) -> bool;

    /// Confirmed height of `hash`, absent when the hash is unknown.
    fn height_of(&self, hash: &Hash) -> Option<u64>;

    /// Header of the confirmed block at `height`.
    fn header_at(&self, height: u64) -> Option<BlockHeader>;

    /// True when `hash` names a stored transaction.
    fn transaction_exists(&self, hash: &Hash) -> bool;

    /// True when a stored input consumes `outpoint`.
    fn is_spent(&self, outpoint: &OutPoint) -> bool;

    /// The stored output for `outpoint`, with its confirmation context.
    fn output_record(&self, outpoint: &OutPoint) -> Option<OutputRecord>;

    /// Cumulative claimed work of confirmed blocks at `first_height` and
    /// above. Accumulation may stop once the total exceeds `maximum`.
    fn fork_work(&self, maximum: &U256, first_height: u64) -> Result<U256, StoreError>;

    /// Pop every confirmed block above the fork point and push the
    /// fork's blocks, atomically with respect to readers. The returned
    /// blocks ascend by height; the last element is the old top.
    async fn reorganize(&self, fork: &Fork, flush: bool) -> Result<Vec<Arc<Block>>, StoreError>;

    /// Take the session flush lock; false when already held.
    fn begin_writes(&self) -> bool;

    /// Release the session flush lock; false when not held.
    fn end_writes(&self) -> bool;
}

/// The candidate block cache. All pooled blocks passed acceptance and
/// lack only sufficient work to reorganize.
pub trait BlockPool: Send + Sync {
    /// The root path through the candidate forest to `block`, ending at
    /// a parent outside the pool. Empty when the block is already
    /// pooled.
    fn get_path(&self, block: Arc<Block>) -> Fork;

    /// Retain a validated candidate that lost the work comparison.
    fn add(&self, block: Arc<Block>, height: u64);

    /// Retain a displaced segment; heights ascend from `first_height`.
    fn add_all(&self, blocks: &[Arc<Block>], first_height: u64);

    /// Discard candidates confirmed by a reorganization.
    fn remove(&self, blocks: &[Arc<Block>]);

    /// Discard candidates that are no longer competitive below the new
    /// top.
    fn prune(&self, top_height: u64);
}

/// Staged block validation driven by the organizer.
#[async_trait]
pub trait BlockValidator: Send + Sync {
    /// Checks that are independent of chain state.
    fn check(&self, block: &Block) -> OrganizeResult<()>;

    /// Contextual acceptance of the fork's top block.
    async fn accept(&self, fork: &Fork) -> OrganizeResult<()>;

    /// Script validation of the fork's top block.
    async fn connect(&self, fork: &Fork) -> OrganizeResult<()>;

    /// Cooperative cancellation of in-flight validation.
    fn stop(&self);
}

/// Per-input script verification seam. A consensus script interpreter
/// plugs in here.
pub trait ScriptVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction, input_index: usize) -> OrganizeResult<()>;
}

/// Decides whether an arriving block is already known.
///
/// The default global scope matches the satoshi behavior: any block
/// present anywhere in the store is a duplicate. Under a hash collision
/// this can split the chain depending on arrival order, because the
/// check is not anchored at the fork point; a corrected predicate would
/// search only descendants of the fork point, and the candidate pool
/// would need to tolerate colliding hashes.
pub trait DuplicateScope<C: ChainStore>: Send + Sync {
    fn is_duplicate(&self, store: &C, fork: &Fork, hash: &Hash) -> bool;
}

/// Store-wide duplicate detection.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalDuplicateScope;

impl<C: ChainStore> DuplicateScope<C> for GlobalDuplicateScope {
    fn is_duplicate(&self, store: &C, _fork: &Fork, hash: &Hash) -> bool {
        store.block_exists(hash)
    }
}
