//! In-memory ledger store
//!
//! Records live in insertion-ordered vectors with hash indexes beside them,
//! all behind one `parking_lot::RwLock`. The whole state can be exported as a
//! [`StoreSnapshot`] for JSON persistence and rebuilt from one.

use crate::core::amount::Amount;
use crate::core::block::Block;
use crate::core::transaction::{Transaction, TxStatus};
use crate::core::utxo::{OutPoint, SpendOutcome, Utxo};
use crate::core::wallet::{BalanceDelta, Wallet, ZakatRecord};
use crate::storage::store::{LedgerStore, StoreError, StoreResult};
use chrono::Utc;
use log::warn;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serializable image of the whole store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub utxos: Vec<Utxo>,
    pub wallets: Vec<Wallet>,
    #[serde(default)]
    pub zakat_records: HashMap<String, Vec<ZakatRecord>>,
}

#[derive(Debug, Default)]
struct Inner {
    blocks: Vec<Block>,
    block_by_hash: HashMap<String, usize>,
    transactions: Vec<Transaction>,
    tx_by_id: HashMap<String, usize>,
    utxos: Vec<Utxo>,
    utxo_by_key: HashMap<OutPoint, usize>,
    wallets: Vec<Wallet>,
    wallet_by_id: HashMap<String, usize>,
    zakat_records: HashMap<String, Vec<ZakatRecord>>,
}

impl Inner {
    fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut inner = Inner {
            zakat_records: snapshot.zakat_records,
            ..Default::default()
        };

        for block in snapshot.blocks {
            inner.push_block(block)?;
        }
        for tx in snapshot.transactions {
            inner.push_transaction(tx)?;
        }
        for utxo in snapshot.utxos {
            let key = utxo.outpoint();
            if !inner.push_utxo(utxo) {
                return Err(StoreError::InvalidData(format!("duplicate UTXO {key}")));
            }
        }
        for wallet in snapshot.wallets {
            inner.push_wallet(wallet)?;
        }

        Ok(inner)
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            blocks: self.blocks.clone(),
            transactions: self.transactions.clone(),
            utxos: self.utxos.clone(),
            wallets: self.wallets.clone(),
            zakat_records: self.zakat_records.clone(),
        }
    }

    fn push_block(&mut self, block: Block) -> StoreResult<()> {
        let expected = self.blocks.len() as u64;
        if block.index != expected {
            return Err(StoreError::OutOfOrder(format!(
                "block index {} (expected {})",
                block.index, expected
            )));
        }
        if self.block_by_hash.contains_key(&block.hash) {
            return Err(StoreError::Duplicate(format!("block {}", block.hash)));
        }
        self.block_by_hash.insert(block.hash.clone(), self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    fn push_transaction(&mut self, tx: Transaction) -> StoreResult<()> {
        if self.tx_by_id.contains_key(&tx.id) {
            return Err(StoreError::Duplicate(format!("transaction {}", tx.id)));
        }
        self.tx_by_id.insert(tx.id.clone(), self.transactions.len());
        self.transactions.push(tx);
        Ok(())
    }

    fn push_utxo(&mut self, utxo: Utxo) -> bool {
        let key = utxo.outpoint();
        if self.utxo_by_key.contains_key(&key) {
            return false;
        }
        self.utxo_by_key.insert(key, self.utxos.len());
        self.utxos.push(utxo);
        true
    }

    fn push_wallet(&mut self, wallet: Wallet) -> StoreResult<()> {
        if self.wallet_by_id.contains_key(&wallet.wallet_id) {
            return Err(StoreError::Duplicate(format!("wallet {}", wallet.wallet_id)));
        }
        self.wallet_by_id
            .insert(wallet.wallet_id.clone(), self.wallets.len());
        self.wallets.push(wallet);
        Ok(())
    }

    fn transaction_mut(&mut self, id: &str) -> StoreResult<&mut Transaction> {
        let idx = *self
            .tx_by_id
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {id}")))?;
        Ok(&mut self.transactions[idx])
    }

    fn wallet_mut(&mut self, wallet_id: &str) -> Option<&mut Wallet> {
        let idx = *self.wallet_by_id.get(wallet_id)?;
        Some(&mut self.wallets[idx])
    }
}

/// Thread-safe in-memory [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store (and its indexes) from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        Ok(Self {
            inner: RwLock::new(Inner::from_snapshot(snapshot)?),
        })
    }

    /// Export the current state
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().to_snapshot()
    }
}

impl LedgerStore for MemoryStore {
    fn append_block(&self, block: &Block) -> StoreResult<()> {
        self.inner.write().push_block(block.clone())
    }

    fn latest_block(&self) -> StoreResult<Option<Block>> {
        Ok(self.inner.read().blocks.last().cloned())
    }

    fn block_by_hash(&self, hash: &str) -> StoreResult<Option<Block>> {
        let inner = self.inner.read();
        Ok(inner
            .block_by_hash
            .get(hash)
            .map(|&idx| inner.blocks[idx].clone()))
    }

    fn block_by_index(&self, index: u64) -> StoreResult<Option<Block>> {
        Ok(self.inner.read().blocks.get(index as usize).cloned())
    }

    fn blocks_descending(&self) -> StoreResult<Vec<Block>> {
        Ok(self.inner.read().blocks.iter().rev().cloned().collect())
    }

    fn block_count(&self) -> StoreResult<u64> {
        Ok(self.inner.read().blocks.len() as u64)
    }

    fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.inner.write().push_transaction(tx.clone())
    }

    fn transaction(&self, id: &str) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.read();
        Ok(inner
            .tx_by_id
            .get(id)
            .map(|&idx| inner.transactions[idx].clone()))
    }

    fn transactions_with_status(&self, status: TxStatus) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .inner
            .read()
            .transactions
            .iter()
            .filter(|tx| tx.status == status)
            .cloned()
            .collect())
    }

    fn transactions_for_wallet(&self, wallet_id: &str) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .inner
            .read()
            .transactions
            .iter()
            .filter(|tx| tx.involves(wallet_id))
            .cloned()
            .collect())
    }

    fn confirm_transaction(&self, id: &str, block_hash: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let tx = inner.transaction_mut(id)?;
        tx.status = TxStatus::Confirmed;
        tx.block_hash = Some(block_hash.to_string());
        Ok(())
    }

    fn reject_transaction(&self, id: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let tx = inner.transaction_mut(id)?;
        if tx.status == TxStatus::Confirmed {
            return Err(StoreError::InvalidData(format!(
                "transaction {id} is already confirmed"
            )));
        }
        tx.status = TxStatus::Rejected;
        Ok(())
    }

    fn insert_utxo(&self, utxo: &Utxo) -> StoreResult<bool> {
        Ok(self.inner.write().push_utxo(utxo.clone()))
    }

    fn utxo(&self, outpoint: &OutPoint) -> StoreResult<Option<Utxo>> {
        let inner = self.inner.read();
        Ok(inner
            .utxo_by_key
            .get(outpoint)
            .map(|&idx| inner.utxos[idx].clone()))
    }

    fn unspent_utxos(&self, wallet_id: &str) -> StoreResult<Vec<Utxo>> {
        Ok(self
            .inner
            .read()
            .utxos
            .iter()
            .filter(|u| !u.is_spent && u.is_owned_by(wallet_id))
            .cloned()
            .collect())
    }

    fn mark_spent(&self, outpoint: &OutPoint, spender_tx_id: &str) -> StoreResult<SpendOutcome> {
        let mut inner = self.inner.write();
        let Some(&idx) = inner.utxo_by_key.get(outpoint) else {
            return Ok(SpendOutcome::Missing);
        };
        let utxo = &mut inner.utxos[idx];

        if utxo.is_spent {
            return Ok(match utxo.spent_in_tx.as_deref() {
                Some(spender) if spender == spender_tx_id => SpendOutcome::AlreadySpentBySame,
                other => SpendOutcome::SpentByOther(other.unwrap_or_default().to_string()),
            });
        }

        utxo.is_spent = true;
        utxo.spent_in_tx = Some(spender_tx_id.to_string());
        Ok(SpendOutcome::Spent)
    }

    fn insert_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        self.inner.write().push_wallet(wallet.clone())
    }

    fn wallet(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        let inner = self.inner.read();
        Ok(inner
            .wallet_by_id
            .get(wallet_id)
            .map(|&idx| inner.wallets[idx].clone()))
    }

    fn wallets(&self) -> StoreResult<Vec<Wallet>> {
        Ok(self.inner.read().wallets.clone())
    }

    fn adjust_cached_balance(&self, wallet_id: &str, delta: BalanceDelta) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let Some(wallet) = inner.wallet_mut(wallet_id) else {
            return Ok(false);
        };

        let (balance, clamped) = delta.apply(wallet.cached_balance);
        if clamped {
            warn!(
                "Cached balance of {} clamped while applying {:?} to {}",
                wallet_id, delta, wallet.cached_balance
            );
        }
        wallet.cached_balance = balance;
        wallet.updated_at = Utc::now();
        Ok(true)
    }

    fn set_cached_balance(&self, wallet_id: &str, balance: Amount) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let wallet = inner
            .wallet_mut(wallet_id)
            .ok_or_else(|| StoreError::NotFound(format!("wallet {wallet_id}")))?;
        wallet.cached_balance = balance;
        wallet.updated_at = Utc::now();
        Ok(())
    }

    fn append_zakat_record(&self, wallet_id: &str, record: &ZakatRecord) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.wallet_by_id.contains_key(wallet_id) {
            return Err(StoreError::NotFound(format!("wallet {wallet_id}")));
        }
        inner
            .zakat_records
            .entry(wallet_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn zakat_records(&self, wallet_id: &str) -> StoreResult<Vec<ZakatRecord>> {
        Ok(self
            .inner
            .read()
            .zakat_records
            .get(wallet_id)
            .cloned()
            .unwrap_or_default())
    }

    fn settle_zakat_record(&self, wallet_id: &str, tx_id: &str, block_hash: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let record = inner
            .zakat_records
            .get_mut(wallet_id)
            .and_then(|records| records.iter_mut().find(|r| r.tx_id == tx_id));
        match record {
            Some(record) => {
                record.block_hash = block_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{Sender, TransactionBuilder, TxType};

    fn transfer(from: &str, to: &str) -> Transaction {
        TransactionBuilder::new(TxType::Transfer, Sender::wallet(from), to, Amount::from_coins(1))
            .add_output(to, Amount::from_coins(1))
            .build_with("", "")
    }

    #[test]
    fn test_blocks_append_in_order() {
        let store = MemoryStore::new();
        let genesis = Block::genesis(1);
        store.append_block(&genesis).unwrap();

        // Re-appending index 0 is out of order
        assert!(matches!(
            store.append_block(&genesis),
            Err(StoreError::OutOfOrder(_))
        ));

        let next = Block::new(1, genesis.hash.clone(), vec![], 1, "m");
        store.append_block(&next).unwrap();

        assert_eq!(store.block_count().unwrap(), 2);
        assert_eq!(store.latest_block().unwrap().unwrap().index, 1);
        let desc = store.blocks_descending().unwrap();
        assert_eq!(desc[0].index, 1);
        assert_eq!(desc[1].index, 0);
        assert_eq!(store.block_by_hash(&genesis.hash).unwrap().unwrap().index, 0);
    }

    #[test]
    fn test_transactions_fifo_by_status() {
        let store = MemoryStore::new();
        let a = transfer("a", "b");
        let b = transfer("b", "c");
        store.insert_transaction(&a).unwrap();
        store.insert_transaction(&b).unwrap();
        assert!(store.insert_transaction(&a).is_err());

        let pending = store.transactions_with_status(TxStatus::Pending).unwrap();
        assert_eq!(pending[0].id, a.id);
        assert_eq!(pending[1].id, b.id);

        store.confirm_transaction(&a.id, "h").unwrap();
        store.reject_transaction(&b.id).unwrap();
        assert!(store.reject_transaction(&a.id).is_err());

        let confirmed = store.transaction(&a.id).unwrap().unwrap();
        assert_eq!(confirmed.block_hash.as_deref(), Some("h"));
        assert_eq!(store.transactions_for_wallet("b").unwrap().len(), 2);
    }

    #[test]
    fn test_mark_spent_is_compare_and_swap() {
        let store = MemoryStore::new();
        let utxo = Utxo::genesis_funding("w", Amount::from_coins(5));
        let key = utxo.outpoint();
        assert!(store.insert_utxo(&utxo).unwrap());
        assert!(!store.insert_utxo(&utxo).unwrap());

        assert_eq!(store.mark_spent(&key, "tx1").unwrap(), SpendOutcome::Spent);
        assert_eq!(store.mark_spent(&key, "tx1").unwrap(), SpendOutcome::AlreadySpentBySame);
        assert_eq!(
            store.mark_spent(&key, "tx2").unwrap(),
            SpendOutcome::SpentByOther("tx1".into())
        );
        assert_eq!(
            store.mark_spent(&OutPoint::new("nope", 0), "tx1").unwrap(),
            SpendOutcome::Missing
        );
        assert!(store.unspent_utxos("w").unwrap().is_empty());
    }

    #[test]
    fn test_cached_balance_adjustments() {
        let store = MemoryStore::new();
        store.insert_wallet(&Wallet::new("w", "pk", None)).unwrap();

        assert!(store
            .adjust_cached_balance("w", BalanceDelta::Credit(Amount::from_coins(10)))
            .unwrap());
        assert!(store
            .adjust_cached_balance("w", BalanceDelta::Debit(Amount::from_coins(4)))
            .unwrap());
        assert_eq!(store.wallet("w").unwrap().unwrap().cached_balance, Amount::from_coins(6));

        assert!(!store
            .adjust_cached_balance("missing", BalanceDelta::Credit(Amount::from_coins(1)))
            .unwrap());
    }

    #[test]
    fn test_zakat_records() {
        let store = MemoryStore::new();
        store.insert_wallet(&Wallet::new("w", "pk", None)).unwrap();
        let record = ZakatRecord {
            amount: Amount::from_coins(1),
            date: Utc::now(),
            tx_id: "z1".into(),
            block_hash: String::new(),
        };
        store.append_zakat_record("w", &record).unwrap();
        assert!(store.append_zakat_record("other", &record).is_err());

        assert!(store.settle_zakat_record("w", "z1", "blockhash").unwrap());
        assert!(!store.settle_zakat_record("w", "z2", "blockhash").unwrap());
        assert_eq!(store.zakat_records("w").unwrap()[0].block_hash, "blockhash");
    }

    #[test]
    fn test_snapshot_roundtrip_rebuilds_indexes() {
        let store = MemoryStore::new();
        store.append_block(&Block::genesis(1)).unwrap();
        store.insert_wallet(&Wallet::new("w", "pk", None)).unwrap();
        let utxo = Utxo::genesis_funding("w", Amount::from_coins(5));
        store.insert_utxo(&utxo).unwrap();

        let restored = MemoryStore::from_snapshot(store.snapshot()).unwrap();
        assert_eq!(restored.block_count().unwrap(), 1);
        assert!(restored.wallet("w").unwrap().is_some());
        assert_eq!(restored.utxo(&utxo.outpoint()).unwrap().unwrap().amount, Amount::from_coins(5));
    }
}
