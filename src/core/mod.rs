//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Amounts (fixed-point, 8 decimals)
//! - Transactions (UTXO model with signed payloads)
//! - UTXOs and wallet records
//! - Blocks (with proof of work)
//! - The chain service (genesis, hashing, validation)
//! - Transaction validation
//! - The ledger error taxonomy

pub mod amount;
pub mod block;
pub mod chain;
pub mod error;
pub mod transaction;
pub mod utxo;
pub mod validator;
pub mod wallet;

pub use amount::{Amount, AmountError, BASIS_POINTS, UNITS_PER_COIN};
pub use block::{Block, PowOutcome, GENESIS_PREVIOUS_HASH};
pub use chain::{
    ChainService, ChainStats, ChainValidation, ChainViolation, ViolationKind, DEFAULT_DIFFICULTY,
    MAX_DIFFICULTY,
};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use transaction::{
    signing_payload, Sender, Transaction, TransactionBuilder, TxInput, TxOutput, TxStatus, TxType,
    CHANGE_OUTPUT_INDEX, RECIPIENT_OUTPUT_INDEX, SYSTEM_SENDER, SYSTEM_SIGNATURE, ZAKAT_SIGNATURE,
};
pub use utxo::{OutPoint, SpendOutcome, Utxo, GENESIS_FUNDING_BLOCK, GENESIS_FUNDING_PREFIX};
pub use validator::TransactionValidator;
pub use wallet::{BalanceDelta, Wallet, ZakatRecord};
