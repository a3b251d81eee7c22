//! # Chain Organizer
//!
//! Decides, for each arriving block, whether its branch displaces the
//! confirmed chain, and commits the swap when it does.
//!
//! One attempt runs at a time: the organize mutex is taken on entry and
//! its guard lives across every validation stage until the terminal
//! outcome, so nothing else mutates store-visible state mid-attempt.
//! CPU-bound stages run on the validation pool and their completions
//! return to the caller's runtime before the pipeline continues.

use hematite_types::{Block, Hash};
use parking_lot::Mutex as StampMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::OrganizerConfig;
use crate::domain::error::{OrganizeError, OrganizeResult};
use crate::domain::Fork;
use crate::events::{ReorganizeEvent, ReorganizeHandler, ReorganizeSubscriber};
use crate::metrics;
use crate::ports::{
    BlockPool, BlockValidator, ChainStore, DuplicateScope, GlobalDuplicateScope, OrganizeApi,
};


/// Stamp recorded for a fork top once its branch wins the work
/// comparison, immediately before the store swap.
#[derive(Clone, Copy, Debug)]
pub struct CommitStamp {
    /// Confirmed height assigned to the block.
    pub height: u64,
    /// When notification began.
    pub started_at: Instant,
}

/// Dependencies for [`Organizer`].
pub struct OrganizerDependencies<C, P, V> {
    pub store: Arc<C>,
    pub block_pool: Arc<P>,
    pub validator: Arc<V>,
    pub config: OrganizerConfig,
}

/// The chain-organization state machine.
pub struct Organizer<C, P, V>
where
    C: ChainStore,
    P: BlockPool,
    V: BlockValidator,
{
    store: Arc<C>,
    block_pool: Arc<P>,
    validator: Arc<V>,
    duplicates: Box<dyn DuplicateScope<C>>,
    subscriber: ReorganizeSubscriber,
    /// Serializes organize attempts end to end.
    organize_mutex: Mutex<()>,
    stopped: AtomicBool,
    flush_reorganizations: bool,
    /// Commit stamps for fork tops, keyed by block hash.
    stamps: StampMutex<HashMap<Hash, CommitStamp>>,
}

impl<C, P, V> Organizer<C, P, V>
where
    C: ChainStore,
    P: BlockPool,
    V: BlockValidator,
{
    /// Create a stopped organizer; call [`Organizer::start`] before
    /// organizing.
    pub fn new(deps: OrganizerDependencies<C, P, V>) -> Self {
        Self {
            store: deps.store,
            block_pool: deps.block_pool,
            validator: deps.validator,
            duplicates: Box::new(GlobalDuplicateScope),
            subscriber: ReorganizeSubscriber::new(),
            organize_mutex: Mutex::new(()),
            stopped: AtomicBool::new(true),
            flush_reorganizations: deps.config.flush_reorganizations,
            stamps: StampMutex::new(HashMap::new()),
        }
    }

    /// Replace the duplicate-detection predicate.
    pub fn with_duplicate_scope(mut self, scope: Box<dyn DuplicateScope<C>>) -> Self {
        self.duplicates = scope;
        self
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Begin accepting blocks. Unless reorganizations flush themselves,
    /// the session flush lock is taken here.
    pub fn start(&self) -> bool {
        self.stopped.store(false, Ordering::SeqCst);
        self.subscriber.start();

        self.flush_reorganizations || self.store.begin_writes()
    }

    /// Stop accepting blocks, draining pending subscribers with a
    /// stopped event. Blocks until an in-flight write completes, so the
    /// flush lock is never released mid-reorganization.
    pub async fn stop(&self) -> bool {
        self.validator.stop();
        self.subscriber.stop();

        let _guard = self.organize_mutex.lock().await;

        // No new validation may begin after this point; tearing down the
        // worker pool under an active write would corrupt the store.
        self.stopped.store(true, Ordering::SeqCst);

        self.flush_reorganizations || self.store.end_writes()
    }

    /// Validate `block` against the confirmed chain and commit a
    /// reorganization when its branch carries strictly more work.
    pub async fn organize(&self, block: Arc<Block>) -> OrganizeResult<()> {
        // The guard survives every stage below, including the store
        // swap, and is released exactly once at return.
        let _guard = self.organize_mutex.lock().await;

        let started = Instant::now();
        let result = self.organize_locked(block).await;
        metrics::record_organize_latency(started.elapsed().as_secs_f64());

        match &result {
            Ok(()) => metrics::record_block_organized(),
            Err(outcome) => metrics::record_block_rejected(rejection_reason(outcome)),
        }

        result
    }

    /// Register a one-shot handler for the next reorganization.
    pub fn subscribe(&self, handler: ReorganizeHandler) {
        self.subscriber.subscribe(handler);
    }

    /// The commit stamp recorded for `hash`, when its branch won.
    pub fn commit_stamp(&self, hash: &Hash) -> Option<CommitStamp> {
        self.stamps.lock().get(hash).copied()
    }

    async fn organize_locked(&self, block: Arc<Block>) -> OrganizeResult<()> {
        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        // Checks that need no chain state.
        self.validator.check(&block)?;

        // The path through the candidate forest back to a confirmed
        // parent.
        let mut fork = self.block_pool.get_path(Arc::clone(&block));

        if fork.is_empty()
            || self
                .duplicates
                .is_duplicate(self.store.as_ref(), &fork, &block.hash())
        {
            debug!(block = %hex::encode(block.hash()), "duplicate block");
            return Err(OrganizeError::DuplicateBlock);
        }

        self.set_fork_height(&mut fork)?;

        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        // Chain-state dependent checks. The fork may yet lack the work
        // to reorganize, but it must be known valid in order to retain
        // its top in the pool.
        self.validator.accept(&fork).await?;

        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        // Script validation.
        self.validator.connect(&fork).await?;

        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        let difficulty = fork.difficulty();
        let first_height = fork
            .height()
            .checked_add(1)
            .ok_or(OrganizeError::OperationFailed)?;

        // The store may stop summing once it passes our total.
        let threshold = self
            .store
            .fork_work(&difficulty, first_height)
            .map_err(|_| OrganizeError::OperationFailed)?;

        if difficulty <= threshold {
            if let Some(top) = fork.top() {
                self.block_pool.add(Arc::clone(top), fork.top_height());
            }
            debug!(
                fork_height = fork.height(),
                size = fork.size(),
                "insufficient work to reorganize"
            );
            return Err(OrganizeError::InsufficientWork);
        }

        // The top block is valid; stamp it before the swap.
        if let Some(top) = fork.top() {
            self.stamps.lock().insert(
                top.hash(),
                CommitStamp {
                    height: fork.top_height(),
                    started_at: Instant::now(),
                },
            );
        }

        // Replace! Switch!
        let outgoing = match self
            .store
            .reorganize(&fork, self.flush_reorganizations)
            .await
        {
            Ok(outgoing) => outgoing,
            Err(fault) => {
                error!(%fault, "failure writing reorganization, store is now corrupt");
                return Err(OrganizeError::Store(fault));
            }
        };

        self.block_pool.remove(fork.blocks());
        self.block_pool.prune(fork.top_height());
        self.block_pool.add_all(&outgoing, first_height);

        info!(
            fork_height = fork.height(),
            incoming = fork.size(),
            outgoing = outgoing.len(),
            "reorganized"
        );
        metrics::record_reorganization();

        self.subscriber.notify(ReorganizeEvent::Reorganized {
            fork_height: fork.height(),
            incoming: fork.blocks().to_vec(),
            outgoing,
        });

        Ok(())
    }

    fn set_fork_height(&self, fork: &mut Fork) -> OrganizeResult<()> {
        debug_assert!(!fork.is_empty());

        // Confirmed parent of the oldest fork block; absent means the
        // branch is an orphan.
        let height = self
            .store
            .height_of(&fork.hash())
            .ok_or(OrganizeError::OrphanBlock)?;

        // Overflow guard on the resulting chain height. The sum itself
        // is unused.
        height
            .checked_add(fork.size())
            .ok_or(OrganizeError::OperationFailed)?;

        fork.set_height(height);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C, P, V> OrganizeApi for Organizer<C, P, V>
where
    C: ChainStore,
    P: BlockPool,
    V: BlockValidator,
{
    async fn organize(&self, block: Arc<Block>) -> OrganizeResult<()> {
        Organizer::organize(self, block).await
    }

    fn subscribe(&self, handler: ReorganizeHandler) {
        Organizer::subscribe(self, handler)
    }
}

fn rejection_reason(outcome: &OrganizeError) -> &'static str {
    match outcome {
        OrganizeError::ServiceStopped => "service_stopped",
        OrganizeError::DuplicateBlock => "duplicate_block",
        OrganizeError::OrphanBlock => "orphan_block",
        OrganizeError::InsufficientWork => "insufficient_work",
        OrganizeError::OperationFailed => "operation_failed",
        OrganizeError::Store(_) => "store_failure",
        _ => "validation_failed",
    }
}
