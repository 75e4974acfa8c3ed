//! Wallet signing keys
//!
//! A [`WalletSigner`] holds a wallet's unsealed key pair and builds signed
//! transfers. [`KeyStore`] keeps sealed private keys as files, one per
//! wallet, so the CLI can sign on a wallet's behalf later.

use crate::core::{Sender, Transaction, TransactionBuilder, TxType};
use crate::crypto::{KeyError, KeyPair, KeySealer, SealError};
use crate::storage::InputSelection;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Wallet key errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("No key stored for wallet {0}")]
    UnknownWallet(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Seal error: {0}")]
    SealError(#[from] SealError),
}

/// A wallet's signing key
pub struct WalletSigner {
    key_pair: KeyPair,
}

impl WalletSigner {
    /// Create a signer with a fresh key pair
    pub fn generate() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    /// Import a signer from a hex private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        Ok(Self {
            key_pair: KeyPair::from_private_key_hex(private_key_hex)?,
        })
    }

    /// Recover a signer from its sealed private key
    pub fn from_sealed(sealed: &str, sealer: &KeySealer) -> Result<Self, WalletError> {
        let private_key_hex = sealer.unseal_str(sealed)?;
        Self::from_private_key(&private_key_hex)
    }

    /// Sealed form of the private key, safe to store
    pub fn seal(&self, sealer: &KeySealer) -> Result<String, WalletError> {
        Ok(sealer.seal_str(&self.key_pair.private_key_hex())?)
    }

    pub fn wallet_id(&self) -> String {
        self.key_pair.wallet_id()
    }

    /// Uncompressed public key (hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Build a signed transfer spending `selection`, paying `receiver`
    /// and returning change to this wallet
    pub fn transfer(
        &self,
        selection: &InputSelection,
        receiver: &str,
        note: &str,
    ) -> Result<Transaction, KeyError> {
        let wallet_id = self.wallet_id();
        TransactionBuilder::new(
            TxType::Transfer,
            Sender::wallet(wallet_id.clone()),
            receiver,
            selection.target,
        )
        .note(note)
        .inputs(selection.inputs.iter().cloned())
        .outputs(selection.outputs(receiver, &wallet_id))
        .build_and_sign(&self.key_pair)
    }
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("wallet_id", &self.wallet_id())
            .finish_non_exhaustive()
    }
}

/// Sealed private keys on disk, `<dir>/<walletId>.key`
pub struct KeyStore {
    keys_dir: PathBuf,
}

impl KeyStore {
    pub fn new(keys_dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(keys_dir)?;
        Ok(Self {
            keys_dir: keys_dir.to_path_buf(),
        })
    }

    fn path(&self, wallet_id: &str) -> PathBuf {
        self.keys_dir.join(format!("{wallet_id}.key"))
    }

    /// Store a sealed private key
    pub fn save(&self, wallet_id: &str, sealed: &str) -> Result<(), WalletError> {
        fs::write(self.path(wallet_id), sealed)?;
        Ok(())
    }

    /// Load a sealed private key
    pub fn load(&self, wallet_id: &str) -> Result<String, WalletError> {
        let path = self.path(wallet_id);
        if !path.exists() {
            return Err(WalletError::UnknownWallet(wallet_id.to_string()));
        }
        Ok(fs::read_to_string(path)?.trim().to_string())
    }

    /// Wallet ids with a stored key, sorted
    pub fn list(&self) -> Result<Vec<String>, WalletError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "key").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load and unseal a wallet's signer
    pub fn signer(&self, wallet_id: &str, sealer: &KeySealer) -> Result<WalletSigner, WalletError> {
        let sealed = self.load(wallet_id)?;
        WalletSigner::from_sealed(&sealed, sealer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, TxInput, CHANGE_OUTPUT_INDEX};
    use crate::crypto::verify_signature;

    #[test]
    fn test_signer_import() {
        let signer = WalletSigner::generate();
        let private_key = signer.key_pair().private_key_hex();

        let imported = WalletSigner::from_private_key(&private_key).unwrap();
        assert_eq!(signer.wallet_id(), imported.wallet_id());
        assert_eq!(signer.wallet_id().len(), 40);
    }

    #[test]
    fn test_seal_roundtrip() {
        let sealer = KeySealer::development();
        let signer = WalletSigner::generate();
        let sealed = signer.seal(&sealer).unwrap();

        let recovered = WalletSigner::from_sealed(&sealed, &sealer).unwrap();
        assert_eq!(recovered.public_key(), signer.public_key());

        let other = KeySealer::new(&[7u8; 32]).unwrap();
        assert!(matches!(
            WalletSigner::from_sealed(&sealed, &other),
            Err(WalletError::SealError(SealError::DecryptionFailed))
        ));
    }

    #[test]
    fn test_transfer_is_signed() {
        let signer = WalletSigner::generate();
        let selection = InputSelection {
            inputs: vec![TxInput {
                tx_id: "genesis_x".into(),
                output_index: 0,
                amount: Amount::from_coins(100),
            }],
            total: Amount::from_coins(100),
            target: Amount::from_coins(30),
        };

        let tx = signer.transfer(&selection, "bob", "rent").unwrap();
        assert_eq!(tx.amount, Amount::from_coins(30));
        assert_eq!(tx.outputs[1].index, CHANGE_OUTPUT_INDEX);
        assert_eq!(tx.outputs[1].wallet_id, signer.wallet_id());
        assert!(verify_signature(&tx.sender_public_key, &tx.signing_payload(), &tx.signature).unwrap());
    }

    #[test]
    fn test_key_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(&dir.path().join("wallets")).unwrap();
        let sealer = KeySealer::development();

        let signer = WalletSigner::generate();
        store.save(&signer.wallet_id(), &signer.seal(&sealer).unwrap()).unwrap();

        assert_eq!(store.list().unwrap(), vec![signer.wallet_id()]);
        let loaded = store.signer(&signer.wallet_id(), &sealer).unwrap();
        assert_eq!(loaded.wallet_id(), signer.wallet_id());
        assert!(matches!(store.load("nobody"), Err(WalletError::UnknownWallet(_))));
    }
}
