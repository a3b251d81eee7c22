//! Contextual validation over the fork and the persistent store.
//!
//! Interior fork blocks were accepted when they entered the candidate
//! forest; only the top block is validated here. Acceptance resolves
//! duplicates, prevouts and spends through the populator; connection
//! runs every input through the script seam. Both phases execute on the
//! validation pool.

use async_trait::async_trait;
use hematite_types::Block;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::check;
use crate::domain::error::{OrganizeError, OrganizeResult};
use crate::domain::{Fork, Populator};
use crate::pool::ValidationPool;
use crate::ports::{BlockValidator, ChainStore, ScriptVerifier};

/// Blocks before a coinbase output may be spent.
pub const COINBASE_MATURITY: u64 = 100;

/// Headers sampled for the median-past-time rule.
const MEDIAN_TIME_SPAN: u64 = 11;

/// The default `BlockValidator`: context-free checks plus fork-and-store
/// contextual acceptance.
pub struct ContextValidator<C, S>
where
    C: ChainStore,
    S: ScriptVerifier,
{
    store: Arc<C>,
    scripts: Arc<S>,
    pool: Arc<ValidationPool>,
    stopped: AtomicBool,
}

impl<C, S> ContextValidator<C, S>
where
    C: ChainStore,
    S: ScriptVerifier,
{
    pub fn new(store: Arc<C>, scripts: Arc<S>, pool: Arc<ValidationPool>) -> Self {
        Self {
            store,
            scripts,
            pool,
            stopped: AtomicBool::new(false),
        }
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C, S> BlockValidator for ContextValidator<C, S>
where
    C: ChainStore + 'static,
    S: ScriptVerifier + 'static,
{
    fn check(&self, block: &Block) -> OrganizeResult<()> {
        check::check_block(block)
    }

    async fn accept(&self, fork: &Fork) -> OrganizeResult<()> {
        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        let fork = fork.clone();
        let store = Arc::clone(&self.store);
        self.pool
            .run(move || accept_top(&fork, store.as_ref()))
            .await?
    }

    async fn connect(&self, fork: &Fork) -> OrganizeResult<()> {
        if self.stopped() {
            return Err(OrganizeError::ServiceStopped);
        }

        let fork = fork.clone();
        let scripts = Arc::clone(&self.scripts);
        self.pool
            .run(move || connect_top(&fork, scripts.as_ref()))
            .await?
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn accept_top<C: ChainStore>(fork: &Fork, store: &C) -> OrganizeResult<()> {
    let top = match fork.top() {
        Some(top) => top,
        None => return Ok(()),
    };
    let top_height = fork.top_height();
    let populator = Populator::new(fork, store);

    check_median_time(top, top_height, &populator)?;

    for tx in &top.transactions {
        let meta = populator.populate_transaction(tx);
        if meta.duplicate {
            return Err(OrganizeError::DuplicateTransaction(tx.hash()));
        }
    }

    // The coinbase has no prevouts to resolve.
    for tx in top.transactions.iter().skip(1) {
        for input in &tx.inputs {
            let outpoint = &input.previous_output;

            let prevout = populator.populate_prevout(outpoint);
            if prevout.cache.is_none() {
                return Err(OrganizeError::MissingPrevout {
                    hash: outpoint.hash,
                    index: outpoint.index,
                });
            }
            if let Some(created_height) = prevout.height {
                if top_height.saturating_sub(created_height) < COINBASE_MATURITY {
                    return Err(OrganizeError::PrematureCoinbaseSpend {
                        created_height,
                        spend_height: top_height,
                    });
                }
            }

            let spend = populator.populate_spent(outpoint);
            if spend.spent {
                return Err(OrganizeError::DoubleSpend {
                    hash: outpoint.hash,
                    index: outpoint.index,
                });
            }
        }
    }

    Ok(())
}

fn check_median_time<C: ChainStore>(
    top: &Arc<Block>,
    top_height: u64,
    populator: &Populator<'_, C>,
) -> OrganizeResult<()> {
    let mut samples: Vec<u32> = (1..=MEDIAN_TIME_SPAN)
        .map_while(|offset| top_height.checked_sub(offset))
        .filter_map(|height| populator.timestamp(height))
        .collect();

    if samples.is_empty() {
        return Ok(());
    }

    samples.sort_unstable();
    let median = samples[samples.len() / 2];

    if top.header.timestamp <= median {
        return Err(OrganizeError::InvalidTimestamp {
            timestamp: top.header.timestamp,
            median,
        });
    }

    Ok(())
}

fn connect_top<S: ScriptVerifier>(fork: &Fork, scripts: &S) -> OrganizeResult<()> {
    let top = match fork.top() {
        Some(top) => top,
        None => return Ok(()),
    };

    for tx in top.transactions.iter().skip(1) {
        for input_index in 0..tx.inputs.len() {
            scripts.verify(tx, input_index)?;
        }
    }

    Ok(())
}

/// Accept-all script verification, for embedders that defer script
/// checking and for tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissiveScripts;

impl ScriptVerifier for PermissiveScripts {
    fn verify(
        &self,
        _tx: &hematite_types::Transaction,
        _input_index: usize,
    ) -> OrganizeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryChainStore;
    use crate::config::OrganizerConfig;
    use hematite_types::{BlockHeader, Hash, Input, OutPoint, Output, Transaction, NULL_HASH};

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

    fn fork_on(genesis: &Arc<Block>, blocks: Vec<Arc<Block>>) -> Fork {
        let mut fork = Fork::new();
        for block in blocks.into_iter().rev() {
            assert!(fork.push_front(block));
        }
        assert_eq!(fork.hash(), genesis.hash());
        fork.set_height(0);
        fork
    }

    fn make_validator(
        store: Arc<InMemoryChainStore>,
    ) -> ContextValidator<InMemoryChainStore, PermissiveScripts> {
        let pool = Arc::new(ValidationPool::new(&OrganizerConfig::default()).unwrap());
        ContextValidator::new(store, Arc::new(PermissiveScripts), pool)
    }

    #[tokio::test]
    async fn test_accept_clean_extension() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        let block = make_block(genesis.hash(), 1100, vec![make_coinbase(1)]);
        let fork = fork_on(&genesis, vec![block]);

        assert_eq!(validator.accept(&fork).await, Ok(()));
        assert_eq!(validator.connect(&fork).await, Ok(()));
    }

    #[tokio::test]
    async fn test_accept_rejects_stale_timestamp() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        let block = make_block(genesis.hash(), 1000, vec![make_coinbase(1)]);
        let fork = fork_on(&genesis, vec![block]);

        assert_eq!(
            validator.accept(&fork).await,
            Err(OrganizeError::InvalidTimestamp {
                timestamp: 1000,
                median: 1000,
            })
        );
    }

    #[tokio::test]
    async fn test_accept_rejects_missing_prevout() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        let orphan_spend = Transaction::new(
            1,
            vec![Input {
                previous_output: OutPoint {
                    hash: [9u8; 32],
                    index: 0,
                },
                script: vec![],
                sequence: u32::MAX,
            }],
            vec![],
            0,
        );
        let block = make_block(genesis.hash(), 1100, vec![make_coinbase(1), orphan_spend]);
        let fork = fork_on(&genesis, vec![block]);

        assert_eq!(
            validator.accept(&fork).await,
            Err(OrganizeError::MissingPrevout {
                hash: [9u8; 32],
                index: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_accept_rejects_immature_coinbase_spend() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        // Spends the genesis coinbase at height 1, 99 blocks early.
        let premature = Transaction::new(
            1,
            vec![Input {
                previous_output: OutPoint {
                    hash: genesis.transactions[0].hash(),
                    index: 0,
                },
                script: vec![],
                sequence: u32::MAX,
            }],
            vec![],
            0,
        );
        let block = make_block(genesis.hash(), 1100, vec![make_coinbase(1), premature]);
        let fork = fork_on(&genesis, vec![block]);

        assert_eq!(
            validator.accept(&fork).await,
            Err(OrganizeError::PrematureCoinbaseSpend {
                created_height: 0,
                spend_height: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_accept_rejects_fork_double_spend() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        let funding = make_coinbase(1);
        let outpoint = OutPoint {
            hash: funding.hash(),
            index: 0,
        };
        let spend = |version: u32| {
            Transaction::new(
                version,
                vec![Input {
                    previous_output: outpoint,
                    script: vec![],
                    sequence: u32::MAX,
                }],
                vec![],
                0,
            )
        };

        // The funding coinbase matures along the branch, then the top
        // block spends it twice.
        let block1 = make_block(genesis.hash(), 1100, vec![funding]);
        let mut blocks = vec![Arc::clone(&block1)];
        let mut previous = block1.hash();
        let mut timestamp = 1100;
        for tag in 2..=COINBASE_MATURITY as u32 {
            timestamp += 100;
            let block = make_block(previous, timestamp, vec![make_coinbase(tag)]);
            previous = block.hash();
            blocks.push(block);
        }
        let double_spender = make_block(
            previous,
            timestamp + 100,
            vec![make_coinbase(900), spend(1), spend(2)],
        );
        blocks.push(double_spender);

        let fork = fork_on(&genesis, blocks);
        assert_eq!(
            validator.accept(&fork).await,
            Err(OrganizeError::DoubleSpend {
                hash: outpoint.hash,
                index: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_stop_cancels_validation() {
        let genesis = make_block(NULL_HASH, 1000, vec![make_coinbase(0)]);
        let store = Arc::new(InMemoryChainStore::new(Arc::clone(&genesis)));
        let validator = make_validator(Arc::clone(&store));

        validator.stop();

        let block = make_block(genesis.hash(), 1100, vec![make_coinbase(1)]);
        let fork = fork_on(&genesis, vec![block]);
        assert_eq!(
            validator.accept(&fork).await,
            Err(OrganizeError::ServiceStopped)
        );
        assert_eq!(
            validator.connect(&fork).await,
            Err(OrganizeError::ServiceStopped)
        );
    }
}
