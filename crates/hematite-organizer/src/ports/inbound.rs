//! Driving ports (inbound API)

use async_trait::async_trait;
use hematite_types::Block;
use std::sync::Arc;

use crate::domain::error::OrganizeResult;
use crate::events::ReorganizeHandler;

/// Block submission surface of the organization core.
#[async_trait]
pub trait OrganizeApi: Send + Sync {
    /// Validate `block` against the confirmed chain and commit a
    /// reorganization when its branch carries strictly more work.
    async fn organize(&self, block: Arc<Block>) -> OrganizeResult<()>;

    /// Register a one-shot handler for the next reorganization.
    fn subscribe(&self, handler: ReorganizeHandler);
}
