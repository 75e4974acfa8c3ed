//! Mining coordinator
//!
//! Turns the whole pending pool into one block: screens the batch for
//! spend conflicts, runs proof of work, appends the block and then
//! materializes each transaction's spends, outputs and balance changes.

use crate::audit::{AuditSink, SystemEvent, TransactionAction, TransactionEvent};
use crate::core::{
    Amount, BalanceDelta, Block, ChainService, ErrorKind, LedgerError, LedgerResult, OutPoint,
    PowOutcome, Transaction, TxStatus, TxType, Utxo,
};
use crate::mining::lease::MiningLease;
use crate::storage::{LedgerStore, UtxoIndex};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(attempts: u64, started: Instant) -> Self {
        let elapsed = started.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };
        Self {
            hash_attempts: attempts,
            time_ms: elapsed,
            hash_rate,
        }
    }
}

/// A pending transaction dropped from the batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedTransaction {
    pub tx_id: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// A successfully mined block
#[derive(Debug, Clone)]
pub struct MinedBlock {
    pub block: Block,
    pub stats: MiningStats,
    /// Pending transactions that lost a spend conflict during this pass
    pub rejected: Vec<RejectedTransaction>,
}

/// Why a mining request did nothing
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// Another pass holds the mining lease
    MiningInProgress,
    /// The pending pool is empty
    NoPendingTransactions,
    /// Every pending transaction was rejected
    AllRejected(Vec<RejectedTransaction>),
}

/// Result of a mining request
#[derive(Debug, Clone)]
pub enum MiningOutcome {
    Mined(MinedBlock),
    Skipped(SkipReason),
    /// Proof of work was cancelled; nothing was appended
    Cancelled { attempts: u64 },
}

impl MiningOutcome {
    /// The mined block, if any
    pub fn block(&self) -> Option<&Block> {
        match self {
            MiningOutcome::Mined(mined) => Some(&mined.block),
            _ => None,
        }
    }
}

/// Snapshot of the mining subsystem
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStatus {
    pub is_mining: bool,
    pub pending_transactions: usize,
    pub current_difficulty: u32,
    pub latest_block_index: u64,
    pub latest_block_hash: String,
}

/// Coordinates mining passes over a ledger store
pub struct MiningCoordinator<S: LedgerStore> {
    store: Arc<S>,
    chain: ChainService<S>,
    utxos: UtxoIndex<S>,
    audit: Arc<dyn AuditSink>,
    lease: MiningLease,
}

impl<S: LedgerStore> MiningCoordinator<S> {
    pub fn new(store: Arc<S>, chain: ChainService<S>, audit: Arc<dyn AuditSink>) -> Self {
        let utxos = UtxoIndex::new(Arc::clone(&store));
        Self {
            store,
            chain,
            utxos,
            audit,
            lease: MiningLease::new(),
        }
    }

    /// Whether a pass is running right now
    pub fn is_mining(&self) -> bool {
        self.lease.is_held()
    }

    /// Run one mining pass crediting `miner`
    pub fn mine(&self, miner: &str) -> LedgerResult<MiningOutcome> {
        self.mine_with_cancel(miner, &AtomicBool::new(false))
    }

    /// Run one mining pass that stops proof of work once `cancel` is set
    pub fn mine_with_cancel(&self, miner: &str, cancel: &AtomicBool) -> LedgerResult<MiningOutcome> {
        if miner.trim().is_empty() {
            return Err(LedgerError::validation("miner wallet id is required"));
        }

        let Some(_lease) = self.lease.try_acquire() else {
            info!("Mining already in progress, request from {} skipped", miner);
            return Ok(MiningOutcome::Skipped(SkipReason::MiningInProgress));
        };

        let pending = self.store.transactions_with_status(TxStatus::Pending)?;
        if pending.is_empty() {
            debug!("No pending transactions to mine");
            return Ok(MiningOutcome::Skipped(SkipReason::NoPendingTransactions));
        }

        let (admitted, rejected) = self.screen(pending)?;
        if admitted.is_empty() {
            warn!("All {} pending transactions were rejected", rejected.len());
            return Ok(MiningOutcome::Skipped(SkipReason::AllRejected(rejected)));
        }

        let mut block = self.chain.candidate_block(admitted, miner)?;
        info!(
            "Mining block {} with difficulty {} ({} transactions)...",
            block.index,
            block.difficulty,
            block.tx_count()
        );

        let started = Instant::now();
        let attempts = match ChainService::<S>::proof_of_work_cancellable(&mut block, cancel) {
            PowOutcome::Found { attempts } => attempts,
            PowOutcome::Cancelled { attempts } => {
                warn!(
                    "Mining block {} cancelled after {} attempts",
                    block.index, attempts
                );
                return Ok(MiningOutcome::Cancelled { attempts });
            }
        };
        let stats = MiningStats::new(attempts, started);
        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.index, stats.time_ms, attempts, stats.hash_rate
        );

        self.chain.append(&block)?;
        for tx in &block.transactions {
            self.materialize(tx, &block.hash)?;
        }

        self.audit.record_system(
            SystemEvent::success(
                "block_mined",
                format!(
                    "Block #{} mined with {} transactions",
                    block.index,
                    block.tx_count()
                ),
            )
            .wallet(miner),
        );

        Ok(MiningOutcome::Mined(MinedBlock {
            block,
            stats,
            rejected,
        }))
    }

    /// Admit transactions in FIFO order; later claimants of an output lose
    fn screen(
        &self,
        batch: Vec<Transaction>,
    ) -> LedgerResult<(Vec<Transaction>, Vec<RejectedTransaction>)> {
        let mut claimed: HashMap<OutPoint, String> = HashMap::new();
        let mut admitted = Vec::with_capacity(batch.len());
        let mut rejected = Vec::new();

        for tx in batch {
            match self.find_conflict(&tx, &claimed)? {
                None => {
                    for outpoint in tx.outpoints() {
                        claimed.insert(outpoint, tx.id.clone());
                    }
                    admitted.push(tx);
                }
                Some(err) => {
                    warn!("Rejecting transaction {}: {}", tx.id, err);
                    self.store.reject_transaction(&tx.id)?;
                    self.record_rejection(&tx, &err);
                    rejected.push(RejectedTransaction {
                        tx_id: tx.id,
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        Ok((admitted, rejected))
    }

    fn find_conflict(
        &self,
        tx: &Transaction,
        claimed: &HashMap<OutPoint, String>,
    ) -> LedgerResult<Option<LedgerError>> {
        for outpoint in tx.outpoints() {
            if let Some(winner) = claimed.get(&outpoint) {
                return Ok(Some(LedgerError::Conflict(format!(
                    "UTXO {outpoint} already claimed by {winner}"
                ))));
            }
            match self.utxos.get(&outpoint)? {
                None => return Ok(Some(LedgerError::UtxoNotFound(outpoint))),
                Some(utxo) if utxo.is_spent && utxo.spent_in_tx.as_deref() != Some(tx.id.as_str()) => {
                    let spender = utxo.spent_in_tx.unwrap_or_default();
                    return Ok(Some(LedgerError::Conflict(format!(
                        "UTXO {outpoint} already spent in {spender}"
                    ))));
                }
                Some(_) => {}
            }
        }
        Ok(None)
    }

    /// Apply one confirmed transaction to the UTXO set and cached balances.
    /// Every step is safe to repeat after a partial failure.
    fn materialize(&self, tx: &Transaction, block_hash: &str) -> LedgerResult<()> {
        self.store.confirm_transaction(&tx.id, block_hash)?;

        let mut spent = Amount::ZERO;
        for input in &tx.inputs {
            if self.utxos.spend(&input.outpoint(), &tx.id)? {
                spent = spent
                    .checked_add(input.amount)
                    .ok_or_else(|| LedgerError::validation("input sum overflow"))?;
            }
        }

        for output in &tx.outputs {
            let utxo = Utxo::new(
                tx.id.clone(),
                output.index,
                output.wallet_id.clone(),
                output.amount,
                block_hash,
            );
            if self.utxos.create(&utxo)? {
                self.adjust(&output.wallet_id, BalanceDelta::Credit(output.amount))?;
            }
        }

        if let Some(sender) = tx.sender.wallet_id() {
            if !spent.is_zero() {
                self.adjust(sender, BalanceDelta::Debit(spent))?;
            }
            if tx.tx_type == TxType::ZakatDeduction {
                self.store.settle_zakat_record(sender, &tx.id, block_hash)?;
            }
        }

        self.record_confirmation(tx, block_hash);
        Ok(())
    }

    fn adjust(&self, wallet_id: &str, delta: BalanceDelta) -> LedgerResult<()> {
        if !self.store.adjust_cached_balance(wallet_id, delta)? {
            warn!("No wallet record for {}, cached balance not updated", wallet_id);
        }
        Ok(())
    }

    fn record_confirmation(&self, tx: &Transaction, block_hash: &str) {
        let event = |action, wallet: &str| {
            TransactionEvent::new(tx.id.clone(), action, wallet, tx.amount, TxStatus::Confirmed)
                .block(block_hash)
                .note(tx.note.clone())
        };

        match (tx.tx_type, tx.sender.wallet_id()) {
            (TxType::MiningReward, _) | (_, None) => {
                self.audit
                    .record_transaction(event(TransactionAction::Mined, &tx.receiver));
            }
            (TxType::ZakatDeduction, Some(sender)) => {
                self.audit
                    .record_transaction(event(TransactionAction::ZakatDeducted, sender));
            }
            (TxType::Transfer, Some(sender)) => {
                self.audit.record_transaction(event(TransactionAction::Sent, sender));
                self.audit
                    .record_transaction(event(TransactionAction::Received, &tx.receiver));
            }
        }
    }

    fn record_rejection(&self, tx: &Transaction, err: &LedgerError) {
        let wallet = tx.sender.wallet_id().unwrap_or(&tx.receiver);
        self.audit.record_transaction(
            TransactionEvent::new(
                tx.id.clone(),
                TransactionAction::Rejected,
                wallet,
                tx.amount,
                TxStatus::Rejected,
            )
            .note(err.to_string()),
        );
    }

    /// Current mining status
    pub fn status(&self) -> LedgerResult<MiningStatus> {
        let pending = self.store.transactions_with_status(TxStatus::Pending)?;
        let tip = self.chain.latest_block()?;
        Ok(MiningStatus {
            is_mining: self.is_mining(),
            pending_transactions: pending.len(),
            current_difficulty: self.chain.difficulty(),
            latest_block_index: tip.index,
            latest_block_hash: tip.hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::core::{Sender, TransactionBuilder, TxInput, Wallet};
    use crate::crypto::KeyPair;
    use crate::storage::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditSink>,
        miner: MiningCoordinator<MemoryStore>,
        alice: KeyPair,
        bob: KeyPair,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let chain = ChainService::new(Arc::clone(&store), 1);
        chain.ensure_genesis().unwrap();

        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        for kp in [&alice, &bob] {
            store
                .insert_wallet(&Wallet::new(kp.wallet_id(), kp.public_key_hex(), None))
                .unwrap();
        }
        store
            .insert_utxo(&Utxo::genesis_funding(&alice.wallet_id(), Amount::from_coins(100)))
            .unwrap();
        store
            .set_cached_balance(&alice.wallet_id(), Amount::from_coins(100))
            .unwrap();

        let audit = Arc::new(MemoryAuditSink::new());
        let miner = MiningCoordinator::new(Arc::clone(&store), chain, audit.clone());
        Fixture {
            store,
            audit,
            miner,
            alice,
            bob,
        }
    }

    fn pay_bob(f: &Fixture, coins: u64, note: &str) -> Transaction {
        let tx = TransactionBuilder::new(
            TxType::Transfer,
            Sender::wallet(f.alice.wallet_id()),
            f.bob.wallet_id(),
            Amount::from_coins(coins),
        )
        .note(note)
        .add_input(TxInput {
            tx_id: format!("genesis_{}", f.alice.wallet_id()),
            output_index: 0,
            amount: Amount::from_coins(100),
        })
        .add_output(f.bob.wallet_id(), Amount::from_coins(coins))
        .add_output(f.alice.wallet_id(), Amount::from_coins(100 - coins))
        .build_and_sign(&f.alice)
        .unwrap();
        f.store.insert_transaction(&tx).unwrap();
        tx
    }

    fn cached(f: &Fixture, kp: &KeyPair) -> Amount {
        f.store.wallet(&kp.wallet_id()).unwrap().unwrap().cached_balance
    }

    #[test]
    fn test_nothing_to_mine() {
        let f = fixture();
        let outcome = f.miner.mine(&f.bob.wallet_id()).unwrap();
        assert!(matches!(
            outcome,
            MiningOutcome::Skipped(SkipReason::NoPendingTransactions)
        ));
    }

    #[test]
    fn test_mining_in_progress_is_a_no_op() {
        let f = fixture();
        pay_bob(&f, 30, "");
        let _held = f.miner.lease.try_acquire().unwrap();
        let outcome = f.miner.mine(&f.bob.wallet_id()).unwrap();
        assert!(matches!(
            outcome,
            MiningOutcome::Skipped(SkipReason::MiningInProgress)
        ));
        assert_eq!(f.store.transactions_with_status(TxStatus::Pending).unwrap().len(), 1);
    }

    #[test]
    fn test_mine_materializes_transfer() {
        let f = fixture();
        let tx = pay_bob(&f, 30, "rent");

        let outcome = f.miner.mine(&f.bob.wallet_id()).unwrap();
        let MiningOutcome::Mined(mined) = outcome else {
            panic!("expected a mined block");
        };
        assert_eq!(mined.block.index, 1);
        assert!(mined.rejected.is_empty());
        assert!(mined.block.is_valid_pow());

        let stored = f.store.transaction(&tx.id).unwrap().unwrap();
        assert_eq!(stored.status, TxStatus::Confirmed);
        assert_eq!(stored.block_hash.as_deref(), Some(mined.block.hash.as_str()));

        let funding = f.store.utxo(&tx.inputs[0].outpoint()).unwrap().unwrap();
        assert!(funding.is_spent);
        assert_eq!(funding.spent_in_tx.as_deref(), Some(tx.id.as_str()));

        assert_eq!(cached(&f, &f.alice), Amount::from_coins(70));
        assert_eq!(cached(&f, &f.bob), Amount::from_coins(30));
        assert!(!f.miner.is_mining());

        let actions: Vec<_> = f.audit.transaction_events().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![TransactionAction::Sent, TransactionAction::Received]);
    }

    #[test]
    fn test_conflicting_spends_first_wins() {
        let f = fixture();
        let first = pay_bob(&f, 30, "first");
        let second = pay_bob(&f, 40, "second");

        let MiningOutcome::Mined(mined) = f.miner.mine(&f.bob.wallet_id()).unwrap() else {
            panic!("expected a mined block");
        };
        assert_eq!(mined.block.tx_count(), 1);
        assert_eq!(mined.rejected.len(), 1);
        assert_eq!(mined.rejected[0].tx_id, second.id);
        assert_eq!(mined.rejected[0].kind, ErrorKind::Conflict);

        assert_eq!(f.store.transaction(&first.id).unwrap().unwrap().status, TxStatus::Confirmed);
        assert_eq!(f.store.transaction(&second.id).unwrap().unwrap().status, TxStatus::Rejected);
        assert_eq!(cached(&f, &f.bob), Amount::from_coins(30));
    }

    #[test]
    fn test_stale_pending_spend_rejected_next_pass() {
        let f = fixture();
        pay_bob(&f, 30, "first");
        f.miner.mine(&f.bob.wallet_id()).unwrap();

        // Submitted against an output that has since been spent
        let late = pay_bob(&f, 10, "late");
        let outcome = f.miner.mine(&f.bob.wallet_id()).unwrap();
        let MiningOutcome::Skipped(SkipReason::AllRejected(rejected)) = outcome else {
            panic!("expected every transaction to be rejected");
        };
        assert_eq!(rejected[0].tx_id, late.id);
        assert_eq!(f.store.block_count().unwrap(), 2);
    }

    #[test]
    fn test_cancelled_pass_leaves_pool_pending() {
        let store = Arc::new(MemoryStore::new());
        // Unreachable difficulty
        let chain = ChainService::new(Arc::clone(&store), 64);
        chain.ensure_genesis().unwrap();
        store.insert_wallet(&Wallet::new("bob", "pk", None)).unwrap();
        let reward = TransactionBuilder::new(
            TxType::MiningReward,
            Sender::SystemIssuance,
            "bob",
            Amount::from_coins(1),
        )
        .add_output("bob", Amount::from_coins(1))
        .build_with("system", "system");
        store.insert_transaction(&reward).unwrap();

        let miner = MiningCoordinator::new(Arc::clone(&store), chain, Arc::new(MemoryAuditSink::new()));
        let cancel = AtomicBool::new(true);
        let outcome = miner.mine_with_cancel("bob", &cancel).unwrap();

        assert!(matches!(outcome, MiningOutcome::Cancelled { .. }));
        assert_eq!(store.block_count().unwrap(), 1);
        assert!(store.transaction(&reward.id).unwrap().unwrap().is_pending());
        assert!(!miner.is_mining());
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let f = fixture();
        let tx = pay_bob(&f, 30, "");
        f.miner.mine(&f.bob.wallet_id()).unwrap();

        // Replaying the same transaction changes nothing
        f.miner.materialize(&tx, "replayed").unwrap();
        assert_eq!(cached(&f, &f.alice), Amount::from_coins(70));
        assert_eq!(cached(&f, &f.bob), Amount::from_coins(30));
    }

    #[test]
    fn test_status() {
        let f = fixture();
        pay_bob(&f, 30, "");
        let status = f.miner.status().unwrap();
        assert!(!status.is_mining);
        assert_eq!(status.pending_transactions, 1);
        assert_eq!(status.current_difficulty, 1);
        assert_eq!(status.latest_block_index, 0);
    }
}
