//! Wallet signing keys and their sealed on-disk form

pub mod signer;

pub use signer::{KeyStore, WalletError, WalletSigner};
