//! Private key sealing
//!
//! Wallet private keys are kept at rest encrypted with AES-256-GCM under a
//! server-held key. The sealed form is `base64(nonce || ciphertext)`, where
//! the ciphertext carries the GCM tag.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use thiserror::Error;

/// AES-256 key size in bytes
pub const SEAL_KEY_SIZE: usize = 32;

/// GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// Development sealing key, used only when no key is configured
pub const DEV_SEAL_KEY: &str = "default-32-byte-key-for-aes-enc!";

/// Errors raised while sealing or unsealing
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SealError {
    #[error("Sealing key must be at least {SEAL_KEY_SIZE} bytes, got {0}")]
    KeyTooShort(usize),
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Sealed value is not valid base64")]
    InvalidEncoding,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
    #[error("Decryption failed")]
    DecryptionFailed,
}

/// Seals and unseals secrets under a fixed AES-256 key
#[derive(Clone)]
pub struct KeySealer {
    key: [u8; SEAL_KEY_SIZE],
}

impl std::fmt::Debug for KeySealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySealer").finish_non_exhaustive()
    }
}

impl KeySealer {
    /// Create a sealer from raw key material. The first 32 bytes are used.
    pub fn new(key_material: &[u8]) -> Result<Self, SealError> {
        if key_material.len() < SEAL_KEY_SIZE {
            return Err(SealError::KeyTooShort(key_material.len()));
        }
        let mut key = [0u8; SEAL_KEY_SIZE];
        key.copy_from_slice(&key_material[..SEAL_KEY_SIZE]);
        Ok(Self { key })
    }

    /// Sealer over the built-in development key
    pub fn development() -> Self {
        let mut key = [0u8; SEAL_KEY_SIZE];
        key.copy_from_slice(DEV_SEAL_KEY.as_bytes());
        Self { key }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    /// Encrypt `plaintext` with a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, SealError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| SealError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypt a value produced by [`KeySealer::seal`]
    pub fn unseal(&self, sealed: &str) -> Result<Vec<u8>, SealError> {
        let data = general_purpose::STANDARD
            .decode(sealed.trim())
            .map_err(|_| SealError::InvalidEncoding)?;

        if data.len() < NONCE_SIZE {
            return Err(SealError::CiphertextTooShort);
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);

        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SealError::DecryptionFailed)
    }

    /// Seal a UTF-8 secret such as a hex private key
    pub fn seal_str(&self, plaintext: &str) -> Result<String, SealError> {
        self.seal(plaintext.as_bytes())
    }

    /// Unseal into a UTF-8 string
    pub fn unseal_str(&self, sealed: &str) -> Result<String, SealError> {
        let bytes = self.unseal(sealed)?;
        String::from_utf8(bytes).map_err(|_| SealError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_unseal_roundtrip() {
        let sealer = KeySealer::development();
        let sealed = sealer.seal_str("deadbeef").unwrap();
        assert_eq!(sealer.unseal_str(&sealed).unwrap(), "deadbeef");
    }

    #[test]
    fn test_nonce_is_fresh() {
        let sealer = KeySealer::development();
        let a = sealer.seal_str("secret").unwrap();
        let b = sealer.seal_str("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealer = KeySealer::development();
        let sealed = sealer.seal_str("secret").unwrap();
        let mut raw = general_purpose::STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = general_purpose::STANDARD.encode(raw);
        assert_eq!(sealer.unseal(&tampered), Err(SealError::DecryptionFailed));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let sealer = KeySealer::development();
        let short = general_purpose::STANDARD.encode([0u8; 5]);
        assert_eq!(sealer.unseal(&short), Err(SealError::CiphertextTooShort));
        assert_eq!(sealer.unseal("%%%"), Err(SealError::InvalidEncoding));
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealer = KeySealer::development();
        let other = KeySealer::new(&[7u8; 32]).unwrap();
        let sealed = sealer.seal_str("secret").unwrap();
        assert_eq!(other.unseal(&sealed), Err(SealError::DecryptionFailed));
    }

    #[test]
    fn test_short_key_rejected() {
        assert_eq!(KeySealer::new(b"short").unwrap_err(), SealError::KeyTooShort(5));
    }
}
