//! Ledger error taxonomy
//!
//! Every failure surfaced by the ledger engine is a [`LedgerError`]. Callers
//! that only need the broad category (for example to choose an HTTP status)
//! use [`LedgerError::kind`].

use crate::core::amount::Amount;
use crate::core::utxo::OutPoint;
use crate::crypto::{KeyError, SealError};
use crate::storage::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Broad category of a ledger error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, rejected
    Validation,
    /// Referenced wallet, UTXO, block or transaction is absent
    NotFound,
    /// Double-spend or duplicate write
    Conflict,
    /// Inputs do not cover the requested amount
    InsufficientBalance,
    /// Bad key, signature or ciphertext
    Cryptographic,
    /// Persistence failure
    InternalStore,
}

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invalid sender wallet ID: {0}")]
    InvalidSender(String),
    #[error("Invalid receiver wallet ID: {0}")]
    InvalidReceiver(String),
    #[error("Invalid digital signature")]
    InvalidSignature,
    #[error("UTXO not found: {0}")]
    UtxoNotFound(OutPoint),
    #[error("Double-spend detected: {0}")]
    DoubleSpend(OutPoint),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Seal error: {0}")]
    Seal(#[from] SealError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Broad category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::InvalidSender(_)
            | LedgerError::InvalidReceiver(_)
            | LedgerError::UtxoNotFound(_)
            | LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::DoubleSpend(_) | LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::InvalidSignature | LedgerError::Key(_) | LedgerError::Seal(_) => {
                ErrorKind::Cryptographic
            }
            LedgerError::Store(e) => e.kind(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }
}

/// Convenience alias used throughout the engine
pub type LedgerResult<T> = Result<T, LedgerError>;
