//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing and the hex difficulty check
//! - ECDSA key management, wallet ids, signing (secp256k1)
//! - Merkle roots over transaction ids
//! - AES-256-GCM sealing of private keys at rest

pub mod hash;
pub mod keys;
pub mod merkle;
pub mod seal;

pub use hash::{leading_zeros, meets_difficulty, sha256, sha256_hex, HASH_HEX_LEN};
pub use keys::{
    public_key_from_hex, sign_payload, verify_signature, wallet_id_from_public_key_hex, KeyError,
    KeyPair, SIGNATURE_LEN, WALLET_ID_LEN,
};
pub use merkle::{calculate_merkle_root, hash_pair, EMPTY_MERKLE_ROOT};
pub use seal::{KeySealer, SealError, DEV_SEAL_KEY, NONCE_SIZE, SEAL_KEY_SIZE};
