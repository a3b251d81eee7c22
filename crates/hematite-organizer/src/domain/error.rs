//! Error types for the organization pipeline.

use hematite_types::Hash;

/// Every outcome an organize attempt or one of its validation stages can
/// surface. The first four are normal outcomes for the caller, not
/// faults.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OrganizeError {
    #[error("service stopped")]
    ServiceStopped,

    #[error("block is already known")]
    DuplicateBlock,

    #[error("block does not connect to the confirmed chain")]
    OrphanBlock,

    #[error("fork work does not exceed the confirmed segment")]
    InsufficientWork,

    #[error("operation failed")]
    OperationFailed,

    #[error("block has no transactions")]
    EmptyBlock,

    #[error("first transaction is not a coinbase")]
    MissingCoinbase,

    #[error("coinbase transaction outside the first position")]
    ExtraCoinbase,

    #[error("undecodable compact target: {bits:#010x}")]
    InvalidTarget { bits: u32 },

    #[error("header hash does not satisfy its claimed target")]
    InvalidProofOfWork,

    #[error("merkle root does not commit to the transaction set")]
    Malleated,

    #[error("transaction {} duplicates a known transaction", hex::encode(.0))]
    DuplicateTransaction(Hash),

    #[error("missing previous output {}:{index}", hex::encode(.hash))]
    MissingPrevout { hash: Hash, index: u32 },

    #[error("previous output {}:{index} is already spent", hex::encode(.hash))]
    DoubleSpend { hash: Hash, index: u32 },

    #[error("coinbase created at height {created_height} spent at height {spend_height} before maturity")]
    PrematureCoinbaseSpend {
        created_height: u64,
        spend_height: u64,
    },

    #[error("timestamp {timestamp} is not after the median past time {median}")]
    InvalidTimestamp { timestamp: u32, median: u32 },

    #[error("script verification failed for transaction {} input {input}", hex::encode(.tx))]
    InvalidScript { tx: Hash, input: u32 },

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Failures raised by the persistent store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("fork point is not on the confirmed chain")]
    InvalidForkPoint,

    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;
