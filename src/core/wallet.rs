//! Wallet records held by the ledger
//!
//! The ledger never stores private keys in the clear. A wallet record keeps
//! the public key, the derived wallet id, and a cached balance that mirrors
//! the sum of the wallet's unspent outputs.

use crate::core::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wallet record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub wallet_id: String,
    pub public_key: String,
    pub cached_balance: Amount,
    /// Owning user reference, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(wallet_id: impl Into<String>, public_key: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            wallet_id: wallet_id.into(),
            public_key: public_key.into(),
            cached_balance: Amount::ZERO,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One zakat deduction applied to a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZakatRecord {
    pub amount: Amount,
    pub date: DateTime<Utc>,
    pub tx_id: String,
    /// Empty until the deduction is mined
    #[serde(default)]
    pub block_hash: String,
}

/// Signed change to a cached balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDelta {
    Credit(Amount),
    Debit(Amount),
}

impl BalanceDelta {
    /// Apply to a balance. Debits below zero clamp at zero and report it.
    pub fn apply(self, balance: Amount) -> (Amount, bool) {
        match self {
            BalanceDelta::Credit(amount) => match balance.checked_add(amount) {
                Some(sum) => (sum, false),
                None => (Amount::from_units(u64::MAX), true),
            },
            BalanceDelta::Debit(amount) => match balance.checked_sub(amount) {
                Some(rest) => (rest, false),
                None => (Amount::ZERO, true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_delta() {
        let ten = Amount::from_coins(10);
        assert_eq!(BalanceDelta::Credit(ten).apply(ten), (Amount::from_coins(20), false));
        assert_eq!(BalanceDelta::Debit(ten).apply(Amount::from_coins(15)), (Amount::from_coins(5), false));
        assert_eq!(BalanceDelta::Debit(ten).apply(Amount::from_coins(3)), (Amount::ZERO, true));
    }

    #[test]
    fn test_wallet_json_layout() {
        let wallet = Wallet::new("abc", "04ff", Some("user-1".into()));
        let value = serde_json::to_value(&wallet).unwrap();
        assert_eq!(value["walletId"], "abc");
        assert_eq!(value["cachedBalance"], 0.0);
        assert_eq!(value["userId"], "user-1");
    }
}
