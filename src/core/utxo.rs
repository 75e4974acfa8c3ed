//! Unspent transaction outputs
//!
//! A UTXO is keyed by the transaction that created it and the output
//! index within that transaction. Once spent it never changes again.

use crate::core::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction id prefix of the funding UTXO credited at wallet creation
pub const GENESIS_FUNDING_PREFIX: &str = "genesis_";

/// Block hash recorded on genesis funding UTXOs
pub const GENESIS_FUNDING_BLOCK: &str = "genesis";

/// Reference to a single transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutPoint {
    pub tx_id: String,
    pub output_index: u32,
}

impl OutPoint {
    pub fn new(tx_id: impl Into<String>, output_index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// Unspent (or spent) transaction output as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub output_index: u32,
    pub wallet_id: String,
    pub amount: Amount,
    #[serde(default)]
    pub is_spent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_in_tx: Option<String>,
    #[serde(default)]
    pub block_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Utxo {
    /// Create an unspent output
    pub fn new(
        tx_id: impl Into<String>,
        output_index: u32,
        wallet_id: impl Into<String>,
        amount: Amount,
        block_hash: impl Into<String>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
            wallet_id: wallet_id.into(),
            amount,
            is_spent: false,
            spent_in_tx: None,
            block_hash: block_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Initial funding output for a freshly created wallet
    pub fn genesis_funding(wallet_id: &str, amount: Amount) -> Self {
        Self::new(
            format!("{GENESIS_FUNDING_PREFIX}{wallet_id}"),
            0,
            wallet_id,
            amount,
            GENESIS_FUNDING_BLOCK,
        )
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id.clone(), self.output_index)
    }

    /// Check if this output belongs to the given wallet
    pub fn is_owned_by(&self, wallet_id: &str) -> bool {
        self.wallet_id == wallet_id
    }
}

/// Result of a compare-and-swap spend on a UTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendOutcome {
    /// The output was unspent and is now spent by the caller
    Spent,
    /// The output was already spent by the same transaction
    AlreadySpentBySame,
    /// The output was already spent by another transaction
    SpentByOther(String),
    /// No output exists under this key
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_funding() {
        let utxo = Utxo::genesis_funding("abc", Amount::from_coins(100));
        assert_eq!(utxo.tx_id, "genesis_abc");
        assert_eq!(utxo.output_index, 0);
        assert_eq!(utxo.block_hash, "genesis");
        assert!(!utxo.is_spent);
        assert!(utxo.is_owned_by("abc"));
    }

    #[test]
    fn test_json_field_layout() {
        let utxo = Utxo::new("tx", 1, "w", Amount::from_coins(2), "h");
        let value = serde_json::to_value(&utxo).unwrap();
        assert_eq!(value["txId"], "tx");
        assert_eq!(value["outputIndex"], 1);
        assert_eq!(value["walletId"], "w");
        assert_eq!(value["isSpent"], false);
        assert!(value.get("spentInTx").is_none());
    }

    #[test]
    fn test_outpoint_display() {
        assert_eq!(OutPoint::new("abc", 2).to_string(), "abc:2");
    }
}
