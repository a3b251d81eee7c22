//! Reference adapters for the outbound ports, exercised by the test
//! suite and usable by embedders directly.

mod memory_chain;
mod memory_pool;
mod validator;

pub use memory_chain::InMemoryChainStore;
pub use memory_pool::InMemoryBlockPool;
pub use validator::{ContextValidator, PermissiveScripts, COINBASE_MATURITY};
