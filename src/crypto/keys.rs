//! ECDSA key management for wallets
//!
//! Provides key pair generation, wallet id derivation, signing, and
//! verification using the secp256k1 elliptic curve. Signatures travel as
//! hex-encoded 64-byte `r || s` values over the SHA-256 digest of a payload.

use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{sha256, sha256_hex};

/// Length of a wallet id in hex characters
pub const WALLET_ID_LEN: usize = 40;

/// Length of a compact `r || s` signature in bytes
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (uncompressed SEC1 form)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    /// Derive the wallet id for this key pair
    pub fn wallet_id(&self) -> String {
        wallet_id_from_public_key_hex(&self.public_key_hex())
    }

    /// Sign a payload, returning the hex-encoded compact signature
    pub fn sign(&self, payload: &str) -> Result<String, KeyError> {
        sign_payload(&self.secret_key, payload)
    }
}

/// Derive a wallet id from the hex text of a public key.
///
/// The id is the first 40 hex characters of SHA-256 over the hex string.
pub fn wallet_id_from_public_key_hex(public_key_hex: &str) -> String {
    let mut digest = sha256_hex(public_key_hex.as_bytes());
    digest.truncate(WALLET_ID_LEN);
    digest
}

/// Parse a public key from hex string (compressed or uncompressed)
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

fn payload_message(payload: &str) -> Result<Message, KeyError> {
    Ok(Message::from_digest_slice(&sha256(payload.as_bytes()))?)
}

/// Sign the SHA-256 digest of `payload` with a secret key
pub fn sign_payload(secret_key: &SecretKey, payload: &str) -> Result<String, KeyError> {
    let secp = Secp256k1::new();
    let message = payload_message(payload)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}

/// Verify a hex signature over `payload` against a hex public key.
///
/// Returns `Ok(false)` for any signature that is not valid hex, does not
/// decode to exactly 64 bytes, or fails verification. A public key that
/// cannot be parsed is an error.
pub fn verify_signature(
    public_key_hex: &str,
    payload: &str,
    signature_hex: &str,
) -> Result<bool, KeyError> {
    let public_key = public_key_from_hex(public_key_hex)?;

    let Ok(bytes) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    if bytes.len() != SIGNATURE_LEN {
        return Ok(false);
    }

    let Ok(mut signature) = Signature::from_compact(&bytes) else {
        return Ok(false);
    };
    // Signatures from other signers may carry a high S value
    signature.normalize_s();

    let secp = Secp256k1::verification_only();
    let message = payload_message(payload)?;
    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}
