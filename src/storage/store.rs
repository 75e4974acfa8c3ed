//! Ledger store abstraction
//!
//! The engine talks to persistence only through [`LedgerStore`]. Every
//! method is atomic for the single record it touches; there are no
//! multi-record transactions. `mark_spent` is the one compare-and-swap the
//! engine relies on to settle double-spend races.

use crate::core::block::Block;
use crate::core::error::ErrorKind;
use crate::core::transaction::{Transaction, TxStatus};
use crate::core::utxo::{OutPoint, SpendOutcome, Utxo};
use crate::core::wallet::{BalanceDelta, Wallet, ZakatRecord};
use crate::core::amount::Amount;
use thiserror::Error;

/// Store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Out of order append: {0}")]
    OutOfOrder(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Broad category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Duplicate(_) | StoreError::OutOfOrder(_) => ErrorKind::Conflict,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Io(_) | StoreError::InvalidData(_) => ErrorKind::InternalStore,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for blocks, transactions, UTXOs and wallets
pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Blocks (append-only)
    // =========================================================================

    /// Append a block. Its index must be exactly one past the current tip.
    fn append_block(&self, block: &Block) -> StoreResult<()>;

    /// Block with the highest index
    fn latest_block(&self) -> StoreResult<Option<Block>>;

    fn block_by_hash(&self, hash: &str) -> StoreResult<Option<Block>>;

    fn block_by_index(&self, index: u64) -> StoreResult<Option<Block>>;

    /// All blocks, highest index first
    fn blocks_descending(&self) -> StoreResult<Vec<Block>>;

    fn block_count(&self) -> StoreResult<u64>;

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Insert a new transaction record
    fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()>;

    fn transaction(&self, id: &str) -> StoreResult<Option<Transaction>>;

    /// Transactions with the given status, in insertion order
    fn transactions_with_status(&self, status: TxStatus) -> StoreResult<Vec<Transaction>>;

    /// Transactions where the wallet is sender or receiver, in insertion order
    fn transactions_for_wallet(&self, wallet_id: &str) -> StoreResult<Vec<Transaction>>;

    /// Mark a transaction confirmed in the given block
    fn confirm_transaction(&self, id: &str, block_hash: &str) -> StoreResult<()>;

    /// Mark a pending transaction rejected
    fn reject_transaction(&self, id: &str) -> StoreResult<()>;

    // =========================================================================
    // UTXOs
    // =========================================================================

    /// Insert an output. Returns `false` if the key already exists.
    fn insert_utxo(&self, utxo: &Utxo) -> StoreResult<bool>;

    fn utxo(&self, outpoint: &OutPoint) -> StoreResult<Option<Utxo>>;

    /// Unspent outputs owned by a wallet, in creation order
    fn unspent_utxos(&self, wallet_id: &str) -> StoreResult<Vec<Utxo>>;

    /// Spend an output only if it is still unspent
    fn mark_spent(&self, outpoint: &OutPoint, spender_tx_id: &str) -> StoreResult<SpendOutcome>;

    // =========================================================================
    // Wallets
    // =========================================================================

    fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()>;

    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>>;

    /// All wallets, in creation order
    fn wallets(&self) -> StoreResult<Vec<Wallet>>;

    /// Atomically adjust a cached balance. Returns `false` if no such wallet.
    fn adjust_cached_balance(&self, wallet_id: &str, delta: BalanceDelta) -> StoreResult<bool>;

    fn set_cached_balance(&self, wallet_id: &str, balance: Amount) -> StoreResult<()>;

    // =========================================================================
    // Zakat records
    // =========================================================================

    fn append_zakat_record(&self, wallet_id: &str, record: &ZakatRecord) -> StoreResult<()>;

    fn zakat_records(&self, wallet_id: &str) -> StoreResult<Vec<ZakatRecord>>;

    /// Record the block that settled a zakat deduction. Returns `false` if
    /// the wallet has no record for that transaction.
    fn settle_zakat_record(&self, wallet_id: &str, tx_id: &str, block_hash: &str) -> StoreResult<bool>;
}
