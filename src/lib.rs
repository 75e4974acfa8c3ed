//! Zakat Ledger: a single-node UTXO ledger in Rust
//!
//! This crate provides:
//! - Proof of Work blocks linked by SHA-256 hashes
//! - ECDSA signed transfers (secp256k1) over unspent outputs
//! - AES-256-GCM sealing of wallet private keys
//! - A mining coordinator that screens the pending pool for double spends
//! - A periodic zakat batch that levies 2.5% of each funded wallet
//! - JSON snapshots, audit logs, a CLI and a REST API
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use zakat_ledger::audit::MemoryAuditSink;
//! use zakat_ledger::config::LedgerConfig;
//! use zakat_ledger::core::Amount;
//! use zakat_ledger::crypto::KeySealer;
//! use zakat_ledger::storage::MemoryStore;
//! use zakat_ledger::Ledger;
//!
//! let ledger = Ledger::open(
//!     Arc::new(MemoryStore::new()),
//!     LedgerConfig::with_difficulty(1),
//!     KeySealer::development(),
//!     Arc::new(MemoryAuditSink::new()),
//! )
//! .unwrap();
//!
//! let alice = ledger.create_wallet(None).unwrap();
//! let bob = ledger.create_wallet(None).unwrap();
//!
//! let signer = ledger.unseal_signer(&alice.sealed_private_key).unwrap();
//! let tx = ledger
//!     .prepare_transfer(&signer, &bob.wallet.wallet_id, Amount::from_coins(10), "lunch")
//!     .unwrap();
//! ledger.submit_transaction(tx).unwrap();
//! ledger.trigger_mining(&bob.wallet.wallet_id).unwrap();
//!
//! assert_eq!(ledger.balance(&bob.wallet.wallet_id).unwrap(), Amount::from_coins(110));
//! ```

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod mining;
pub mod storage;
pub mod wallet;
pub mod zakat;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use config::LedgerConfig;
pub use core::{Amount, Block, LedgerError, Transaction, TxStatus, TxType, Wallet, DEFAULT_DIFFICULTY};
pub use crypto::{KeyPair, KeySealer};
pub use ledger::Ledger;
pub use mining::{MiningCoordinator, MiningOutcome};
pub use storage::{MemoryStore, SnapshotStorage};
pub use wallet::{KeyStore, WalletSigner};
pub use zakat::{ZakatBatchProcessor, ZakatPolicy};
