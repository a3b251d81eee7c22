//! # Fork + Store Population
//!
//! Resolves previous outputs, spends and duplicate transactions for a
//! block under validation. The in-flight fork segment answers first; the
//! persistent store answers for everything at or below the fork point.

use hematite_types::{Hash, OutPoint, Output, Transaction};

use super::fork::Fork;
use crate::ports::ChainStore;

/// Duplicate-transaction state for one transaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct TxMeta {
    /// The transaction hash occurs elsewhere in the fork or the store.
    pub duplicate: bool,
}

/// Spend state for one previous output.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpendMeta {
    /// Another input consumes the same outpoint.
    pub spent: bool,
    /// The competing spend is on the confirmed chain. Fork-local scans
    /// mirror `spent` here; consumers treat the flag as fork-local.
    pub confirmed: bool,
}

/// Resolved previous output for one input.
#[derive(Clone, Debug, Default)]
pub struct PrevoutMeta {
    /// The referenced output, when it resolved.
    pub cache: Option<Output>,
    /// Creation height, set iff the providing transaction is a coinbase.
    /// Maturity rules key off it.
    pub height: Option<u64>,
}

/// A resolved output row from the persistent store.
#[derive(Clone, Debug)]
pub struct OutputRecord {
    pub output: Output,
    /// Confirmed height of the providing transaction.
    pub height: u64,
    /// The providing transaction is its block's coinbase.
    pub coinbase: bool,
}

/// Borrowing populator over one fork and the persistent store.
pub struct Populator<'a, C: ChainStore> {
    fork: &'a Fork,
    store: &'a C,
}

impl<'a, C: ChainStore> Populator<'a, C> {
    pub fn new(fork: &'a Fork, store: &'a C) -> Self {
        Self { fork, store }
    }

    /// Duplicate detection across the fork and the store.
    pub fn populate_transaction(&self, tx: &Transaction) -> TxMeta {
        let mut meta = self.fork.populate_tx(tx);
        if !meta.duplicate {
            meta.duplicate = self.store.transaction_exists(&tx.hash());
        }
        meta
    }

    /// Spend detection across the fork and the store. Store spends are
    /// confirmed by definition.
    pub fn populate_spent(&self, outpoint: &OutPoint) -> SpendMeta {
        let mut meta = self.fork.populate_spent(outpoint);
        if !meta.spent && self.store.is_spent(outpoint) {
            meta.spent = true;
            meta.confirmed = true;
        }
        meta
    }

    /// Prevout resolution: the fork shadows the store.
    pub fn populate_prevout(&self, outpoint: &OutPoint) -> PrevoutMeta {
        let mut meta = self.fork.populate_prevout(outpoint);
        if meta.cache.is_none() && !outpoint.is_null() {
            if let Some(record) = self.store.output_record(outpoint) {
                meta.cache = Some(record.output);
                meta.height = record.coinbase.then_some(record.height);
            }
        }
        meta
    }

    /// Bits of the block at `height`, wherever it lives.
    pub fn bits(&self, height: u64) -> Option<u32> {
        if height > self.fork.height() {
            self.fork.get_bits(height)
        } else {
            self.store.header_at(height).map(|header| header.bits)
        }
    }

    /// Version of the block at `height`, wherever it lives.
    pub fn version(&self, height: u64) -> Option<u32> {
        if height > self.fork.height() {
            self.fork.get_version(height)
        } else {
            self.store.header_at(height).map(|header| header.version)
        }
    }

    /// Timestamp of the block at `height`, wherever it lives.
    pub fn timestamp(&self, height: u64) -> Option<u32> {
        if height > self.fork.height() {
            self.fork.get_timestamp(height)
        } else {
            self.store.header_at(height).map(|header| header.timestamp)
        }
    }

    /// Hash of the block at `height`, wherever it lives.
    pub fn block_hash(&self, height: u64) -> Option<Hash> {
        if height > self.fork.height() {
            self.fork.get_block_hash(height)
        } else {
            self.store.header_at(height).map(|header| header.hash())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChainStore;
    use hematite_types::{Block, BlockHeader, Input, NULL_HASH};
    use std::sync::Arc;

    fn make_coinbase(tag: u32) -> Transaction {
        Transaction::new(
            1,
            vec![Input {
                previous_output: OutPoint::null(),
                script: tag.to_le_bytes().to_vec(),
                sequence: u32::MAX,
            }],
            vec![Output {
                value: 50,
                script: vec![0x51],
            }],
            0,
        )
    }

    fn make_block(previous: Hash, timestamp: u32, transactions: Vec<Transaction>) -> Arc<Block> {
        Arc::new(Block::new(
            BlockHeader {
                version: 1,
                previous_block_hash: previous,
                merkle_root: NULL_HASH,
                timestamp,
                bits: 0x207f_ffff,
                nonce: 0,
            },
            transactions,
        ))
    }

    fn store_with_chain() -> (Arc<Block>, InMemoryChainStore) {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = InMemoryChainStore::new(Arc::clone(&genesis));
        (genesis, store)
    }

    #[test]
    fn test_prevout_falls_back_to_store() {
        let (genesis, store) = store_with_chain();
        let confirmed_coinbase = genesis.transactions[0].clone();
        let outpoint = OutPoint {
            hash: confirmed_coinbase.hash(),
            index: 0,
        };

        let mut fork = Fork::new();
        fork.push_front(make_block(genesis.hash(), 1100, vec![make_coinbase(1)]));

        let populator = Populator::new(&fork, &store);
        let meta = populator.populate_prevout(&outpoint);
        assert_eq!(meta.cache.unwrap().value, 50);
        // The confirmed provider is a coinbase at height zero.
        assert_eq!(meta.height, Some(0));
    }

    #[test]
    fn test_fork_shadows_store_prevout() {
        let (genesis, store) = store_with_chain();
        // The fork re-includes the confirmed coinbase; its fork instance
        // must answer with the fork height.
        let repeated = genesis.transactions[0].clone();
        let outpoint = OutPoint {
            hash: repeated.hash(),
            index: 0,
        };

        let mut fork = Fork::new();
        fork.push_front(make_block(genesis.hash(), 1100, vec![repeated]));

        let populator = Populator::new(&fork, &store);
        assert_eq!(populator.populate_prevout(&outpoint).height, Some(1));
    }

    #[test]
    fn test_duplicate_found_in_store() {
        let (genesis, store) = store_with_chain();
        let repeated = genesis.transactions[0].clone();

        let mut fork = Fork::new();
        fork.push_front(make_block(genesis.hash(), 1100, vec![repeated.clone()]));

        let populator = Populator::new(&fork, &store);
        assert!(populator.populate_transaction(&repeated).duplicate);

        let fresh = make_coinbase(7);
        let mut fresh_fork = Fork::new();
        fresh_fork.push_front(make_block(genesis.hash(), 1100, vec![fresh.clone()]));
        let populator = Populator::new(&fresh_fork, &store);
        assert!(!populator.populate_transaction(&fresh).duplicate);
    }

    #[test]
    fn test_header_history_splits_at_fork_point() {
        let (genesis, store) = store_with_chain();

        let mut fork = Fork::new();
        fork.push_front(make_block(genesis.hash(), 1100, vec![make_coinbase(1)]));
        // Fork point is the genesis block.

        let populator = Populator::new(&fork, &store);
        assert_eq!(populator.timestamp(0), Some(1000));
        assert_eq!(populator.timestamp(1), Some(1100));
        assert_eq!(populator.timestamp(2), None);
        assert_eq!(populator.bits(1), Some(0x207f_ffff));
        assert_eq!(populator.version(0), Some(1));
        assert_eq!(populator.block_hash(0), Some(genesis.hash()));
    }
}
