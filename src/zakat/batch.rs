//! Zakat batch processor
//!
//! Levies the configured rate on every funded wallet by queueing a pending
//! `zakat_deduction` transaction that pays the pool wallet. Deductions take
//! effect only once mined, like any other transaction.

use crate::audit::{AuditSink, SystemEvent, TransactionAction, TransactionEvent};
use crate::core::{
    Amount, ErrorKind, LedgerResult, Sender, TransactionBuilder, TransactionValidator,
    TxStatus, TxType, Wallet, ZakatRecord, ZAKAT_SIGNATURE,
};
use crate::storage::{LedgerStore, UtxoIndex};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Default levy in basis points (2.5%)
pub const DEFAULT_ZAKAT_RATE_BPS: u32 = 250;

/// Wallet that receives every deduction
pub const ZAKAT_POOL_WALLET_ID: &str = "zakat_pool_wallet_00000000000000000000";

/// Rate and destination of the levy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZakatPolicy {
    pub rate_bps: u32,
    pub pool_wallet_id: String,
}

impl Default for ZakatPolicy {
    fn default() -> Self {
        Self {
            rate_bps: DEFAULT_ZAKAT_RATE_BPS,
            pool_wallet_id: ZAKAT_POOL_WALLET_ID.to_string(),
        }
    }
}

impl ZakatPolicy {
    /// Note attached to each deduction, e.g. "Monthly Zakat Deduction (2.5%)"
    pub fn note(&self) -> String {
        let percent = self.rate_bps as f64 / 100.0;
        format!("Monthly Zakat Deduction ({percent}%)")
    }

    /// Levy owed on a balance, rounded down to the smallest unit
    pub fn levy(&self, balance: Amount) -> Amount {
        balance.basis_points(self.rate_bps)
    }
}

/// A deduction queued by the batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZakatDeduction {
    pub wallet_id: String,
    pub tx_id: String,
    pub balance: Amount,
    pub amount: Amount,
}

/// A wallet the batch could not process
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZakatFailure {
    pub wallet_id: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of one batch run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZakatBatchReport {
    pub deductions: Vec<ZakatDeduction>,
    /// Wallets whose levy rounded to zero
    pub skipped: Vec<String>,
    pub failures: Vec<ZakatFailure>,
}

impl ZakatBatchReport {
    /// Sum of all queued deductions
    pub fn total_deducted(&self) -> Amount {
        Amount::checked_sum(self.deductions.iter().map(|d| d.amount))
            .unwrap_or(Amount::from_units(u64::MAX))
    }
}

/// Generates zakat deductions for every funded wallet
pub struct ZakatBatchProcessor<S: LedgerStore> {
    store: Arc<S>,
    utxos: UtxoIndex<S>,
    validator: TransactionValidator<S>,
    audit: Arc<dyn AuditSink>,
    policy: ZakatPolicy,
}

impl<S: LedgerStore> ZakatBatchProcessor<S> {
    pub fn new(store: Arc<S>, policy: ZakatPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            utxos: UtxoIndex::new(Arc::clone(&store)),
            validator: TransactionValidator::new(Arc::clone(&store))
                .with_zakat_pool(policy.pool_wallet_id.clone()),
            store,
            audit,
            policy,
        }
    }

    pub fn policy(&self) -> &ZakatPolicy {
        &self.policy
    }

    /// Run one batch. Only failing to list wallets aborts; per-wallet
    /// failures are collected in the report.
    pub fn run(&self) -> LedgerResult<ZakatBatchReport> {
        let wallets = self.store.wallets()?;
        let mut report = ZakatBatchReport::default();

        for wallet in wallets {
            if wallet.cached_balance.is_zero() || wallet.wallet_id == self.policy.pool_wallet_id {
                continue;
            }

            match self.deduct(&wallet) {
                Ok(Some(deduction)) => report.deductions.push(deduction),
                Ok(None) => report.skipped.push(wallet.wallet_id),
                Err(e) => {
                    warn!("Zakat deduction failed for {}: {}", wallet.wallet_id, e);
                    self.audit.record_system(
                        SystemEvent::failure("zakat_deduction", e.to_string())
                            .wallet(wallet.wallet_id.clone())
                            .user(wallet.user_id.clone()),
                    );
                    report.failures.push(ZakatFailure {
                        wallet_id: wallet.wallet_id,
                        kind: e.kind(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Zakat batch queued {} deductions totalling {} ({} skipped, {} failed)",
            report.deductions.len(),
            report.total_deducted(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn deduct(&self, wallet: &Wallet) -> LedgerResult<Option<ZakatDeduction>> {
        let amount = self.policy.levy(wallet.cached_balance);
        if amount.is_zero() {
            return Ok(None);
        }

        let selection = self.utxos.select_inputs(&wallet.wallet_id, amount)?;
        let note = self.policy.note();
        let tx = TransactionBuilder::new(
            TxType::ZakatDeduction,
            Sender::wallet(wallet.wallet_id.clone()),
            self.policy.pool_wallet_id.clone(),
            amount,
        )
        .note(note.clone())
        .inputs(selection.inputs.iter().cloned())
        .outputs(selection.outputs(&self.policy.pool_wallet_id, &wallet.wallet_id))
        .build_with(wallet.public_key.clone(), ZAKAT_SIGNATURE);

        self.validator.validate(&tx)?;
        self.store.insert_transaction(&tx)?;

        let record = ZakatRecord {
            amount,
            date: tx.timestamp,
            tx_id: tx.id.clone(),
            block_hash: String::new(),
        };
        if let Err(e) = self.store.append_zakat_record(&wallet.wallet_id, &record) {
            // The deduction is already queued; losing the record is not fatal
            warn!("Failed to record zakat for {}: {}", wallet.wallet_id, e);
        }

        info!(
            "Queued zakat of {} for wallet {} (tx {})",
            amount, wallet.wallet_id, tx.id
        );
        self.audit.record_system(
            SystemEvent::success("zakat_deduction", "Monthly zakat deduction processed")
                .wallet(wallet.wallet_id.clone())
                .user(wallet.user_id.clone()),
        );
        self.audit.record_transaction(
            TransactionEvent::new(
                tx.id.clone(),
                TransactionAction::ZakatDeducted,
                wallet.wallet_id.clone(),
                amount,
                TxStatus::Pending,
            )
            .note(note),
        );

        Ok(Some(ZakatDeduction {
            wallet_id: wallet.wallet_id.clone(),
            tx_id: tx.id,
            balance: wallet.cached_balance,
            amount,
        }))
    }
}
