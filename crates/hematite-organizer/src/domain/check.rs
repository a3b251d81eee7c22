//! Context-free block checks: everything decidable from the block alone,
//! before any chain state is consulted.

use hematite_types::{work, Block, Transaction};

use super::error::{OrganizeError, OrganizeResult};

/// Run every context-free check against `block`.
pub fn check_block(block: &Block) -> OrganizeResult<()> {
    check_transactions(block)?;
    check_proof_of_work(block)?;
    check_merkle_root(block)
}

fn check_transactions(block: &Block) -> OrganizeResult<()> {
    if block.transactions.is_empty() {
        return Err(OrganizeError::EmptyBlock);
    }

    if !block.transactions[0].is_coinbase() {
        return Err(OrganizeError::MissingCoinbase);
    }

    if block
        .transactions
        .iter()
        .skip(1)
        .any(Transaction::is_coinbase)
    {
        return Err(OrganizeError::ExtraCoinbase);
    }

    Ok(())
}

fn check_proof_of_work(block: &Block) -> OrganizeResult<()> {
    let bits = block.header.bits;

    if work::compact_to_target(bits).is_none() {
        return Err(OrganizeError::InvalidTarget { bits });
    }

    if !work::satisfies_pow(&block.header) {
        return Err(OrganizeError::InvalidProofOfWork);
    }

    Ok(())
}

fn check_merkle_root(block: &Block) -> OrganizeResult<()> {
    if work::merkle_root(&block.transactions) != block.header.merkle_root {
        return Err(OrganizeError::Malleated);
    }

    Ok(())
}
