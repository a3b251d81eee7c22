//! # Core Chain Entities
//!
//! The Bitcoin-model chain records: outpoints, inputs, outputs,
//! transactions, headers and blocks.
//!
//! Blocks and transactions are shared immutably (`Arc`) across
//! subsystems; their content hashes are computed on first use and cached.
//! Wire-format deserialization is handled elsewhere, so hashing here uses
//! the library's canonical little-endian encoding.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::work;

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

/// A 32-byte double-SHA256 digest.
pub type Hash = [u8; 32];

/// The digest that denotes "none".
pub const NULL_HASH: Hash = [0u8; 32];

/// A reference to a specific transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the providing transaction.
    pub hash: Hash,
    /// Index into the providing transaction's outputs.
    pub index: u32,
}

impl OutPoint {
    /// The marker outpoint carried by a coinbase input.
    pub fn null() -> Self {
        Self {
            hash: NULL_HASH,
            index: u32::MAX,
        }
    }

    /// True for the coinbase marker.
    pub fn is_null(&self) -> bool {
        self.hash == NULL_HASH && self.index == u32::MAX
    }
}

/// A transaction input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// The output this input consumes.
    pub previous_output: OutPoint,
    /// Unlocking script.
    pub script: Vec<u8>,
    /// Relative-lock sequence field.
    pub sequence: u32,
}

/// A transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Amount in base units.
    pub value: u64,
    /// Locking script.
    pub script: Vec<u8>,
}

/// An immutable transaction with a cached content hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub lock_time: u32,
    #[serde(skip)]
    hash: OnceCell<Hash>,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<Input>, outputs: Vec<Output>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
            hash: OnceCell::new(),
        }
    }

    /// The content hash, computed once.
    pub fn hash(&self) -> Hash {
        *self
            .hash
            .get_or_init(|| work::double_sha256(&self.encode()))
    }

    /// A coinbase has exactly one input and that input is null.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(64);
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buffer.extend_from_slice(&input.previous_output.hash);
            buffer.extend_from_slice(&input.previous_output.index.to_le_bytes());
            buffer.extend_from_slice(&(input.script.len() as u32).to_le_bytes());
            buffer.extend_from_slice(&input.script);
            buffer.extend_from_slice(&input.sequence.to_le_bytes());
        }
        buffer.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buffer.extend_from_slice(&output.value.to_le_bytes());
            buffer.extend_from_slice(&(output.script.len() as u32).to_le_bytes());
            buffer.extend_from_slice(&output.script);
        }
        buffer.extend_from_slice(&self.lock_time.to_le_bytes());
        buffer
    }
}

/// The 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Protocol version for this block.
    pub version: u32,
    /// Hash of the parent block (creates the chain linkage).
    pub previous_block_hash: Hash,
    /// Merkle root of all transactions in the block.
    pub merkle_root: Hash,
    /// Unix timestamp claimed by the miner.
    pub timestamp: u32,
    /// Compact encoding of the proof-of-work target.
    pub bits: u32,
    /// Proof-of-work counter.
    pub nonce: u32,
}

impl BlockHeader {
    /// Double-SHA256 of the 80-byte little-endian layout.
    pub fn hash(&self) -> Hash {
        let mut buffer = [0u8; 80];
        buffer[0..4].copy_from_slice(&self.version.to_le_bytes());
        buffer[4..36].copy_from_slice(&self.previous_block_hash);
        buffer[36..68].copy_from_slice(&self.merkle_root);
        buffer[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buffer[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buffer[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        work::double_sha256(&buffer)
    }

    /// The work this header claims through its compact target.
    ///
    /// Zero when `bits` does not decode to a target.
    pub fn work(&self) -> U256 {
        work::claimed_work(self.bits)
    }
}

/// An immutable block with a cached hash (the header hash).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    #[serde(skip)]
    hash: OnceCell<Hash>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            hash: OnceCell::new(),
        }
    }

    /// The block identity, computed once.
    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| self.header.hash())
    }
}
