//! Block implementation for the ledger
//!
//! A block carries its ordered transactions, a link to its predecessor and
//! the proof-of-work nonce that makes its hash meet the difficulty target.

use crate::core::transaction::{Transaction, SYSTEM_SENDER};
use crate::crypto::{calculate_merkle_root, meets_difficulty, sha256_hex, EMPTY_MERKLE_ROOT};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Previous hash recorded on the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// How many nonces are tried between cancellation checks
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Outcome of a cancellable proof-of-work search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowOutcome {
    /// A valid nonce was found after the given number of attempts
    Found { attempts: u64 },
    /// The search was cancelled before a valid nonce was found
    Cancelled { attempts: u64 },
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block index/height
    pub index: u64,
    /// Block creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Transactions in block order
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Nonce found by proof of work
    pub nonce: u64,
    /// Block hash
    pub hash: String,
    /// Merkle root of the contained transaction ids
    pub merkle_root: String,
    /// Required number of leading '0' hex characters
    pub difficulty: u32,
    /// Wallet id of the miner
    pub miner: String,
}

impl Block {
    /// Create a new candidate block (unmined)
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
        miner: impl Into<String>,
    ) -> Self {
        let merkle_root = Self::calculate_merkle_root(&transactions);
        let mut block = Self {
            index,
            timestamp: Utc::now(),
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
            merkle_root,
            difficulty,
            miner: miner.into(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Create the genesis block. Its hash is computed but not mined.
    pub fn genesis(difficulty: u32) -> Self {
        let mut block = Self {
            index: 0,
            timestamp: Utc::now(),
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
            merkle_root: EMPTY_MERKLE_ROOT.to_string(),
            difficulty,
            miner: SYSTEM_SENDER.to_string(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Calculate the merkle root from transactions
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> String {
        let ids: Vec<&str> = transactions.iter().map(|tx| tx.id.as_str()).collect();
        calculate_merkle_root(&ids)
    }

    /// Hash over `index || timestamp || previous_hash || merkle_root || nonce || tx ids`
    pub fn calculate_hash(&self) -> String {
        let mut data = format!(
            "{}{}{}{}{}",
            self.index,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.previous_hash,
            self.merkle_root,
            self.nonce
        );
        for tx in &self.transactions {
            data.push_str(&tx.id);
        }
        sha256_hex(data.as_bytes())
    }

    /// Mine the block (find a valid nonce), returning the number of attempts
    pub fn mine(&mut self) -> u64 {
        let never = AtomicBool::new(false);
        match self.mine_cancellable(&never) {
            PowOutcome::Found { attempts } | PowOutcome::Cancelled { attempts } => attempts,
        }
    }

    /// Mine the block until a valid nonce is found or `cancel` is set
    pub fn mine_cancellable(&mut self, cancel: &AtomicBool) -> PowOutcome {
        let mut attempts = 0u64;
        self.nonce = 0;

        loop {
            self.hash = self.calculate_hash();
            attempts += 1;

            if self.is_valid_pow() {
                return PowOutcome::Found { attempts };
            }

            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                return PowOutcome::Cancelled { attempts };
            }

            self.nonce = self.nonce.wrapping_add(1);
        }
    }

    /// Check if the stored hash meets the difficulty target
    pub fn is_valid_pow(&self) -> bool {
        meets_difficulty(&self.hash, self.difficulty)
    }

    /// Verify the block's merkle root
    pub fn verify_merkle_root(&self) -> bool {
        Self::calculate_merkle_root(&self.transactions) == self.merkle_root
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::amount::Amount;
    use crate::core::transaction::{Sender, TransactionBuilder, TxType, SYSTEM_SIGNATURE};

    fn reward(to: &str) -> Transaction {
        TransactionBuilder::new(TxType::MiningReward, Sender::SystemIssuance, to, Amount::from_coins(1))
            .add_output(to, Amount::from_coins(1))
            .build_with(SYSTEM_SIGNATURE, SYSTEM_SIGNATURE)
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(5);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.merkle_root, "0");
        assert_eq!(genesis.miner, "system");
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.verify_hash());
    }

    #[test]
    fn test_block_mining() {
        let mut block = Block::new(1, "abc".into(), vec![reward("miner")], 2, "miner");
        let attempts = block.mine();

        assert!(attempts >= 1);
        assert!(block.hash.starts_with("00"));
        assert!(block.is_valid_pow());
        assert!(block.verify_merkle_root());
        assert!(block.verify_hash());
    }

    #[test]
    fn test_cancelled_mining() {
        let mut block = Block::new(1, "abc".into(), vec![], 64, "miner");
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            block.mine_cancellable(&cancel),
            PowOutcome::Cancelled { .. }
        ));
    }

    #[test]
    fn test_hash_covers_transactions() {
        let mut block = Block::new(1, "abc".into(), vec![reward("miner")], 1, "miner");
        block.mine();
        block.transactions[0].id = "tampered".into();
        assert!(!block.verify_hash());
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn test_json_field_layout() {
        let value = serde_json::to_value(Block::genesis(1)).unwrap();
        assert_eq!(value["previousHash"], "0");
        assert_eq!(value["merkleRoot"], "0");
        assert!(value["transactions"].as_array().unwrap().is_empty());
    }
}
