//! # Proof-of-Work Arithmetic
//!
//! Compact target decoding, claimed work and merkle commitments.
//!
//! **IMPORTANT**: the difficulty target is a CEILING:
//! - HIGHER target number = EASIER (more valid hashes below it)
//! - LOWER target number = HARDER (fewer valid hashes below it)
//!
//! Claimed work is the expected number of hash attempts the target
//! implies, `(~target / (target + 1)) + 1`. Summing claimed work over a
//! chain segment is how competing branches are compared.

use primitive_types::U256;
use sha2::{Digest, Sha256};

use crate::entities::{BlockHeader, Hash, Transaction, NULL_HASH};

/// sha256(sha256(data)).
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Decode a compact (exponent/mantissa) target.
///
/// `None` for a zero mantissa, a set sign bit, or a mantissa that would
/// shift past 256 bits (exponent above 32).
pub fn compact_to_target(bits: u32) -> Option<U256> {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;

    if bits & 0x0080_0000 != 0 || mantissa == 0 {
        return None;
    }

    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        if exponent > 32 {
            return None;
        }
        U256::from(mantissa) << (8 * (exponent - 3))
    };

    if target.is_zero() {
        None
    } else {
        Some(target)
    }
}

/// Expected hash attempts implied by `target`.
pub fn target_to_work(target: U256) -> U256 {
    if target.is_zero() {
        return U256::zero();
    }
    if target == U256::MAX {
        return U256::one();
    }
    (!target / (target + U256::one())) + U256::one()
}

/// The work a header claims through its compact `bits` field.
///
/// Zero when the compact encoding is invalid; such headers are rejected
/// by the context-free checks before work is ever summed.
pub fn claimed_work(bits: u32) -> U256 {
    compact_to_target(bits)
        .map(target_to_work)
        .unwrap_or_default()
}

/// True when the header hash, read as a little-endian 256-bit integer,
/// does not exceed its decoded target.
pub fn satisfies_pow(header: &BlockHeader) -> bool {
    match compact_to_target(header.bits) {
        Some(target) => U256::from_little_endian(&header.hash()) <= target,
        None => false,
    }
}

/// Merkle root of the transaction set: pairwise double-SHA256, odd node
/// duplicated, empty set committed as the null hash.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return NULL_HASH;
    }

    let mut layer: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = layer[layer.len() - 1];
            layer.push(last);
        }
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut buffer = [0u8; 64];
                buffer[..32].copy_from_slice(&pair[0]);
                buffer[32..].copy_from_slice(&pair[1]);
                double_sha256(&buffer)
            })
            .collect();
    }

    layer[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Input, OutPoint, Output};

    fn make_transaction(tag: u32) -> Transaction {
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

    #[test]
    fn test_compact_mainnet_genesis() {
        let target = compact_to_target(0x1d00_ffff).unwrap();
        assert_eq!(target, U256::from(0xffffu64) << 208);
    }

    #[test]
    fn test_compact_rejects_sign_bit() {
        assert!(compact_to_target(0x1d80_0000).is_none());
    }

    #[test]
    fn test_compact_rejects_zero_mantissa() {
        assert!(compact_to_target(0x1d00_0000).is_none());
    }

    #[test]
    fn test_compact_rejects_oversized_exponent() {
        assert!(compact_to_target(0x2100_ffff).is_none());
    }

    #[test]
    fn test_compact_small_exponent_shifts_down() {
        // Exponent 1 keeps only the mantissa's top byte.
        assert_eq!(compact_to_target(0x0112_3456), Some(U256::from(0x12u64)));
        // Shifting everything out decodes as no target at all.
        assert!(compact_to_target(0x0000_1234).is_none());
    }

    #[test]
    fn test_claimed_work_mainnet_genesis() {
        // 2^256 / (0xffff * 2^208 + 1), the well-known 0x1_0001_0001.
        assert_eq!(claimed_work(0x1d00_ffff), U256::from(4_295_032_369u64));
    }

    #[test]
    fn test_claimed_work_regtest_bits() {
        assert_eq!(claimed_work(0x207f_ffff), U256::from(2u64));
        assert_eq!(claimed_work(0x203f_ffff), U256::from(4u64));
    }

    #[test]
    fn test_claimed_work_invalid_bits_is_zero() {
        assert_eq!(claimed_work(0x0000_0000), U256::zero());
    }

    #[test]
    fn test_target_to_work_extremes() {
        assert_eq!(target_to_work(U256::zero()), U256::zero());
        assert_eq!(target_to_work(U256::MAX), U256::one());
    }

    #[test]
    fn test_satisfies_pow_after_grinding() {
        let mut header = BlockHeader {
            version: 1,
            previous_block_hash: NULL_HASH,
            merkle_root: NULL_HASH,
            timestamp: 1000,
            bits: 0x207f_ffff,
            nonce: 0,
        };
        while !satisfies_pow(&header) {
            header.nonce += 1;
            assert!(header.nonce < 10_000, "grinding should succeed quickly");
        }
        assert!(satisfies_pow(&header));
    }

    #[test]
    fn test_satisfies_pow_invalid_bits() {
        let header = BlockHeader {
            version: 1,
            previous_block_hash: NULL_HASH,
            merkle_root: NULL_HASH,
            timestamp: 1000,
            bits: 0,
            nonce: 0,
        };
        assert!(!satisfies_pow(&header));
    }

    #[test]
    fn test_merkle_root_empty() {
        assert_eq!(merkle_root(&[]), NULL_HASH);
    }

    #[test]
    fn test_merkle_root_single_is_tx_hash() {
        let tx = make_transaction(7);
        assert_eq!(merkle_root(std::slice::from_ref(&tx)), tx.hash());
    }

    #[test]
    fn test_merkle_root_pairs() {
        let a = make_transaction(1);
        let b = make_transaction(2);

        let mut buffer = [0u8; 64];
        buffer[..32].copy_from_slice(&a.hash());
        buffer[32..].copy_from_slice(&b.hash());
        let expected = double_sha256(&buffer);

        assert_eq!(merkle_root(&[a, b]), expected);
    }

    #[test]
    fn test_merkle_root_odd_count_duplicates_last() {
        let a = make_transaction(1);
        let b = make_transaction(2);
        let c = make_transaction(3);

        // Three leaves hash as [ab, cc] then their pair.
        let pair = |left: Hash, right: Hash| {
            let mut buffer = [0u8; 64];
            buffer[..32].copy_from_slice(&left);
            buffer[32..].copy_from_slice(&right);
            double_sha256(&buffer)
        };
        let expected = pair(pair(a.hash(), b.hash()), pair(c.hash(), c.hash()));

        assert_eq!(merkle_root(&[a, b, c]), expected);
    }
}
