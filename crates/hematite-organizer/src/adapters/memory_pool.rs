//! In-memory candidate forest with depth-bounded pruning.
//!
//! There is no search within pooled blocks, only hash and height
//! bookkeeping; the fork object carries the chain queries for new block
//! validation.

use hematite_types::{Block, Hash};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Fork;
use crate::ports::BlockPool;

struct Entry {
    block: Arc<Block>,
    height: u64,
}

/// Hash-keyed candidate cache.
pub struct InMemoryBlockPool {
    /// Candidates rooted deeper than this below the top are purged.
    maximum_depth: u64,
    entries: RwLock<HashMap<Hash, Entry>>,
}

impl InMemoryBlockPool {
    pub fn new(maximum_depth: u64) -> Self {
        Self {
            maximum_depth,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.read().contains_key(hash)
    }
}

impl BlockPool for InMemoryBlockPool {
    fn get_path(&self, block: Arc<Block>) -> Fork {
        let entries = self.entries.read();
        let mut fork = Fork::new();

        if entries.contains_key(&block.hash()) {
            return fork;
        }

        fork.push_front(block);
        // Walk ancestors through the pool; the lookup key is the fork
        // point, so linkage holds by construction.
        while let Some(entry) = entries.get(&fork.hash()) {
            fork.push_front(Arc::clone(&entry.block));
        }

        fork
    }

    fn add(&self, block: Arc<Block>, height: u64) {
        self.entries
            .write()
            .insert(block.hash(), Entry { block, height });
    }

    fn add_all(&self, blocks: &[Arc<Block>], first_height: u64) {
        let mut entries = self.entries.write();
        for (index, block) in blocks.iter().enumerate() {
            let height = first_height.saturating_add(index as u64);
            entries.insert(
                block.hash(),
                Entry {
                    block: Arc::clone(block),
                    height,
                },
            );
        }
    }

    fn remove(&self, blocks: &[Arc<Block>]) {
        let mut entries = self.entries.write();
        for block in blocks {
            entries.remove(&block.hash());
        }
    }

    fn prune(&self, top_height: u64) {
        let maximum_depth = self.maximum_depth;
        self.entries
            .write()
            .retain(|_, entry| entry.height.saturating_add(maximum_depth) >= top_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hematite_types::{BlockHeader, NULL_HASH};

    fn make_block(previous: Hash, tag: u32) -> Arc<Block> {
        Arc::new(Block::new(
            BlockHeader {
                version: 1,
                previous_block_hash: previous,
                merkle_root: NULL_HASH,
                timestamp: tag,
                bits: 0x207f_ffff,
                nonce: 0,
            },
            vec![],
        ))
    }

    #[test]
    fn test_get_path_single_block() {
        let pool = InMemoryBlockPool::new(50);
        let block = make_block([1u8; 32], 0);

        let fork = pool.get_path(Arc::clone(&block));
        assert_eq!(fork.size(), 1);
        assert_eq!(fork.hash(), [1u8; 32]);
    }

    #[test]
    fn test_get_path_walks_pooled_ancestors() {
        let pool = InMemoryBlockPool::new(50);
        let root = make_block([1u8; 32], 0);
        let middle = make_block(root.hash(), 1);
        let tip = make_block(middle.hash(), 2);

        pool.add(Arc::clone(&root), 5);
        pool.add(Arc::clone(&middle), 6);

        let fork = pool.get_path(Arc::clone(&tip));
        assert_eq!(fork.size(), 3);
        assert_eq!(fork.hash(), [1u8; 32]);
        assert_eq!(fork.block_at(0).unwrap().hash(), root.hash());
        assert_eq!(fork.block_at(2).unwrap().hash(), tip.hash());
    }

    #[test]
    fn test_get_path_pooled_block_is_empty() {
        let pool = InMemoryBlockPool::new(50);
        let block = make_block([1u8; 32], 0);
        pool.add(Arc::clone(&block), 5);

        assert!(pool.get_path(block).is_empty());
    }

    #[test]
    fn test_remove_and_prune() {
        let pool = InMemoryBlockPool::new(10);
        let shallow = make_block([1u8; 32], 0);
        let deep = make_block([2u8; 32], 1);

        pool.add(Arc::clone(&shallow), 100);
        pool.add(Arc::clone(&deep), 80);
        assert_eq!(pool.len(), 2);

        // Depth 10 below top 100 keeps height 100 and drops height 80.
        pool.prune(100);
        assert!(pool.contains(&shallow.hash()));
        assert!(!pool.contains(&deep.hash()));

        pool.remove(&[shallow.clone()]);
        assert!(pool.is_empty());
    }
}
