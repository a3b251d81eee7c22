//! Port traits: the surfaces this subsystem offers and consumes.

pub mod inbound;
pub mod outbound;

pub use inbound::OrganizeApi;
pub use outbound::{
    BlockPool, BlockValidator, ChainStore, DuplicateScope, GlobalDuplicateScope, ScriptVerifier,
};
