//! # Hematite Organizer - Fork Validation & Chain Organization
//!
//! Decides whether a newly arrived block, possibly building on a side
//! branch, displaces the confirmed main chain, and atomically swaps the
//! competing segment into the persistent store when it does.
//!
//! ## Purpose
//!
//! The organizer assembles the candidate branch into a [`Fork`], runs
//! staged validation against the fork and the store, compares cumulative
//! claimed work against the competing confirmed segment, and commits a
//! reorganization only when the fork's work is strictly greater.
//!
//! ## Architecture
//!
//! - `domain` holds the fork segment, the populator and the
//!   context-free checks;
//! - `ports` declares the consumed surfaces (store, candidate pool,
//!   validator, script seam) and the inbound organize API;
//! - `adapters` supplies in-memory reference implementations and the
//!   default contextual validator;
//! - `service` is the organizer state machine itself;
//! - `events` carries reorganization notifications to subscribers.
//!
//! Organize attempts are serialized end to end by a single mutex whose
//! guard survives every asynchronous stage. CPU-bound validation runs on
//! a dedicated [`ValidationPool`].
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use hematite_organizer::{
//!     ContextValidator, InMemoryBlockPool, InMemoryChainStore, Organizer,
//!     OrganizerConfig, OrganizerDependencies, PermissiveScripts, ValidationPool,
//! };
//!
//! let config = OrganizerConfig::default();
//! let store = Arc::new(InMemoryChainStore::new(genesis));
//! let pool = Arc::new(InMemoryBlockPool::new(50));
//! let validation = Arc::new(ValidationPool::new(&config)?);
//! let validator = Arc::new(ContextValidator::new(
//!     Arc::clone(&store),
//!     Arc::new(PermissiveScripts),
//!     validation,
//! ));
//!
//! let organizer = Organizer::new(OrganizerDependencies {
//!     store,
//!     block_pool: pool,
//!     validator,
//!     config,
//! });
//! organizer.start();
//! organizer.organize(block).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod events;
pub mod metrics;
pub mod pool;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::{
    ContextValidator, InMemoryBlockPool, InMemoryChainStore, PermissiveScripts, COINBASE_MATURITY,
};
pub use config::OrganizerConfig;
pub use domain::{
    Fork, OrganizeError, OrganizeResult, OutputRecord, Populator, PrevoutMeta, SpendMeta,
    StoreError, TxMeta,
};
pub use events::{ReorganizeEvent, ReorganizeHandler, ReorganizeSubscriber};
pub use pool::ValidationPool;
pub use ports::{
    BlockPool, BlockValidator, ChainStore, DuplicateScope, GlobalDuplicateScope, OrganizeApi,
    ScriptVerifier,
};
pub use service::{CommitStamp, Organizer, OrganizerDependencies};
