//! Audit event records

use crate::core::amount::Amount;
use crate::core::transaction::TxStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the audited action succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Success,
    Failure,
}

/// A system-level action such as mining a block or running a zakat batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<String>,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
}

impl SystemEvent {
    pub fn success(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::with_status(action, details, EventStatus::Success)
    }

    pub fn failure(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self::with_status(action, details, EventStatus::Failure)
    }

    fn with_status(action: impl Into<String>, details: impl Into<String>, status: EventStatus) -> Self {
        Self {
            action: action.into(),
            user_id: None,
            wallet_id: None,
            details: details.into(),
            ip_address: None,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn wallet(mut self, wallet_id: impl Into<String>) -> Self {
        self.wallet_id = Some(wallet_id.into());
        self
    }

    pub fn user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// What happened to a wallet in a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAction {
    Sent,
    Received,
    Mined,
    ZakatDeducted,
    Rejected,
}

/// A per-wallet transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub tx_id: String,
    pub action: TransactionAction,
    pub wallet_id: String,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    pub status: TxStatus,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn new(
        tx_id: impl Into<String>,
        action: TransactionAction,
        wallet_id: impl Into<String>,
        amount: Amount,
        status: TxStatus,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            action,
            wallet_id: wallet_id.into(),
            amount,
            block_hash: None,
            status,
            note: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn block(mut self, block_hash: impl Into<String>) -> Self {
        self.block_hash = Some(block_hash.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}
