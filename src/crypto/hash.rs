//! Hashing utilities for the ledger
//!
//! Provides the SHA-256 helpers used for block hashes, transaction ids,
//! wallet ids and merkle roots.

use sha2::{Digest, Sha256};

/// Number of hex characters in a SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks if a hex hash meets the difficulty target.
/// The hash must start with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    if required > hash_hex.len() {
        return false;
    }
    hash_hex.bytes().take(required).all(|b| b == b'0')
}

/// Counts the leading `'0'` characters of a hex hash
pub fn leading_zeros(hash_hex: &str) -> usize {
    hash_hex.bytes().take_while(|b| *b == b'0').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(sha256_hex(data).len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_meets_difficulty() {
        let hash = "000a3f";
        assert!(meets_difficulty(hash, 0));
        assert!(meets_difficulty(hash, 3));
        assert!(!meets_difficulty(hash, 4));
        // Longer than the hash itself can never be met
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(leading_zeros("000a3f"), 3);
        assert_eq!(leading_zeros("a000"), 0);
    }
}
