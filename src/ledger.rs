//! Ledger facade
//!
//! [`Ledger`] wires the chain service, UTXO index, validator, mining
//! coordinator and zakat processor over one store and exposes the inbound
//! operations the CLI and REST adapters call.

use crate::audit::{AuditSink, SystemEvent, TransactionAction, TransactionEvent};
use crate::config::LedgerConfig;
use crate::core::{
    Amount, BalanceDelta, Block, ChainService, ChainStats, ChainValidation, LedgerError,
    LedgerResult, Sender, Transaction, TransactionBuilder, TransactionValidator, TxStatus, TxType,
    Utxo, Wallet, ZakatRecord, SYSTEM_SIGNATURE,
};
use crate::crypto::{KeyPair, KeySealer};
use crate::mining::{MiningCoordinator, MiningOutcome, MiningStatus};
use crate::storage::{LedgerStore, UtxoIndex};
use crate::wallet::WalletSigner;
use crate::zakat::{ZakatBatchProcessor, ZakatBatchReport};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// History entries returned when the caller gives no limit
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// A freshly created wallet and its sealed private key
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedWallet {
    pub wallet: Wallet,
    /// `base64(nonce || ciphertext)`; only the holder of the sealing key can open it
    pub sealed_private_key: String,
}

/// A cached balance that disagreed with the wallet's unspent outputs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCorrection {
    pub wallet_id: String,
    pub cached: Amount,
    pub actual: Amount,
}

/// The ledger engine over a store
pub struct Ledger<S: LedgerStore> {
    store: Arc<S>,
    config: LedgerConfig,
    sealer: KeySealer,
    chain: ChainService<S>,
    utxos: UtxoIndex<S>,
    validator: TransactionValidator<S>,
    miner: MiningCoordinator<S>,
    zakat: ZakatBatchProcessor<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Open a ledger, creating the genesis block and the zakat pool wallet
    /// if the store is empty
    pub fn open(
        store: Arc<S>,
        config: LedgerConfig,
        sealer: KeySealer,
        audit: Arc<dyn AuditSink>,
    ) -> LedgerResult<Self> {
        config
            .validate()
            .map_err(|e| LedgerError::validation(e.to_string()))?;

        let chain = ChainService::new(Arc::clone(&store), config.difficulty);
        let genesis = chain.ensure_genesis()?;

        let pool = &config.zakat_pool_wallet_id;
        if store.wallet(pool)?.is_none() {
            store.insert_wallet(&Wallet::new(pool.clone(), "", None))?;
            info!("Created zakat pool wallet {}", pool);
        }

        let ledger = Self {
            utxos: UtxoIndex::new(Arc::clone(&store)),
            validator: TransactionValidator::new(Arc::clone(&store))
                .with_zakat_pool(config.zakat_pool_wallet_id.clone()),
            miner: MiningCoordinator::new(Arc::clone(&store), chain.clone(), Arc::clone(&audit)),
            zakat: ZakatBatchProcessor::new(Arc::clone(&store), config.zakat_policy(), Arc::clone(&audit)),
            store,
            config,
            sealer,
            chain,
            audit,
        };
        info!(
            "Ledger opened at height {} (genesis {}, difficulty {})",
            ledger.chain.height()?,
            genesis.hash,
            ledger.config.difficulty
        );
        Ok(ledger)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Generate a key pair and register its wallet. The private key is
    /// returned sealed; the ledger keeps only the public key.
    pub fn create_wallet(&self, user_id: Option<String>) -> LedgerResult<CreatedWallet> {
        let key_pair = KeyPair::generate();
        let wallet = Wallet::new(key_pair.wallet_id(), key_pair.public_key_hex(), user_id.clone());
        let sealed_private_key = self.sealer.seal_str(&key_pair.private_key_hex())?;

        self.store.insert_wallet(&wallet)?;
        info!("Created wallet {}", wallet.wallet_id);
        self.audit.record_system(
            SystemEvent::success("wallet_created", "Wallet created")
                .wallet(wallet.wallet_id.clone())
                .user(user_id),
        );

        if !self.config.initial_wallet_funding.is_zero() {
            self.fund_from_genesis(&wallet.wallet_id, self.config.initial_wallet_funding)?;
        }

        Ok(CreatedWallet {
            wallet: self.wallet(&wallet.wallet_id)?,
            sealed_private_key,
        })
    }

    /// Grant a wallet its one-time genesis funding output
    pub fn fund_from_genesis(&self, wallet_id: &str, amount: Amount) -> LedgerResult<Utxo> {
        if amount.is_zero() {
            return Err(LedgerError::validation("funding amount must be positive"));
        }
        self.wallet(wallet_id)?;

        let utxo = Utxo::genesis_funding(wallet_id, amount);
        if !self.utxos.create(&utxo)? {
            return Err(LedgerError::Conflict(format!(
                "wallet {wallet_id} already has genesis funding"
            )));
        }
        self.store
            .adjust_cached_balance(wallet_id, BalanceDelta::Credit(amount))?;

        info!("Funded wallet {} with {} from genesis", wallet_id, amount);
        self.audit.record_transaction(
            TransactionEvent::new(
                utxo.tx_id.clone(),
                TransactionAction::Received,
                wallet_id,
                amount,
                TxStatus::Confirmed,
            )
            .block(utxo.block_hash.clone())
            .note("Initial funding"),
        );
        Ok(utxo)
    }

    /// Open a sealed private key
    pub fn unseal_signer(&self, sealed_private_key: &str) -> LedgerResult<WalletSigner> {
        let private_key_hex = self.sealer.unseal_str(sealed_private_key)?;
        Ok(WalletSigner::from_key_pair(KeyPair::from_private_key_hex(
            &private_key_hex,
        )?))
    }

    pub fn wallet(&self, wallet_id: &str) -> LedgerResult<Wallet> {
        self.store
            .wallet(wallet_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet_id}")))
    }

    pub fn wallets(&self) -> LedgerResult<Vec<Wallet>> {
        Ok(self.store.wallets()?)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Select inputs and build a signed transfer from the signer's wallet.
    /// The result still has to be submitted.
    pub fn prepare_transfer(
        &self,
        signer: &WalletSigner,
        receiver: &str,
        amount: Amount,
        note: &str,
    ) -> LedgerResult<Transaction> {
        let sender = signer.wallet_id();
        if amount < self.config.min_transfer {
            return Err(LedgerError::validation(format!(
                "amount {} is below the minimum transfer of {}",
                amount, self.config.min_transfer
            )));
        }
        if receiver == sender {
            return Err(LedgerError::validation("cannot send to your own wallet"));
        }

        let selection = self.utxos.select_inputs(&sender, amount)?;
        Ok(signer.transfer(&selection, receiver, note)?)
    }

    /// Validate a signed transfer and queue it as pending. Zakat
    /// deductions and issued value are only ever created by the ledger.
    pub fn submit_transaction(&self, tx: Transaction) -> LedgerResult<String> {
        if tx.tx_type != TxType::Transfer {
            let e = LedgerError::validation(format!("{} transactions cannot be submitted", tx.tx_type));
            return Err(self.refuse(&tx, e));
        }
        self.enqueue(tx)
    }

    fn refuse(&self, tx: &Transaction, e: LedgerError) -> LedgerError {
        warn!("Rejected transaction {}: {}", tx.id, e);
        self.audit.record_system(
            SystemEvent::failure("transaction_rejected", e.to_string()).wallet(tx.sender.as_str()),
        );
        e
    }

    /// Queue a transaction of any type once it validates
    pub(crate) fn enqueue(&self, mut tx: Transaction) -> LedgerResult<String> {
        if let Err(e) = self.validator.validate(&tx) {
            return Err(self.refuse(&tx, e));
        }

        tx.status = TxStatus::Pending;
        tx.block_hash = None;
        self.store.insert_transaction(&tx)?;

        info!(
            "Queued {} {} from {} to {} ({})",
            tx.tx_type, tx.id, tx.sender, tx.receiver, tx.amount
        );
        self.audit.record_transaction(
            TransactionEvent::new(
                tx.id.clone(),
                TransactionAction::Sent,
                tx.sender.as_str(),
                tx.amount,
                TxStatus::Pending,
            )
            .note(tx.note.clone()),
        );
        Ok(tx.id)
    }

    /// Queue newly issued value for a wallet, such as a mining reward
    pub fn issue_system_transaction(
        &self,
        receiver: &str,
        amount: Amount,
        note: &str,
    ) -> LedgerResult<String> {
        self.wallet(receiver)?;
        let tx = TransactionBuilder::new(TxType::MiningReward, Sender::SystemIssuance, receiver, amount)
            .note(note)
            .add_output(receiver, amount)
            .build_with(SYSTEM_SIGNATURE, SYSTEM_SIGNATURE);
        self.enqueue(tx)
    }

    pub fn transaction(&self, tx_id: &str) -> LedgerResult<Transaction> {
        self.store
            .transaction(tx_id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {tx_id}")))
    }

    /// The pending pool, oldest first
    pub fn pending(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.store.transactions_with_status(TxStatus::Pending)?)
    }

    /// Transactions touching a wallet, newest first
    pub fn history(&self, wallet_id: &str, limit: Option<usize>) -> LedgerResult<Vec<Transaction>> {
        let mut txs = self.store.transactions_for_wallet(wallet_id)?;
        txs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        txs.truncate(limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        Ok(txs)
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Spendable balance: the sum of the wallet's unspent outputs
    pub fn balance(&self, wallet_id: &str) -> LedgerResult<Amount> {
        self.wallet(wallet_id)?;
        self.utxos.balance(wallet_id)
    }

    pub fn utxos(&self, wallet_id: &str) -> LedgerResult<Vec<Utxo>> {
        self.utxos.unspent(wallet_id)
    }

    /// Reset every cached balance that drifted from its UTXO sum
    pub fn reconcile_balances(&self) -> LedgerResult<Vec<BalanceCorrection>> {
        let mut corrections = Vec::new();
        for wallet in self.store.wallets()? {
            let actual = self.utxos.balance(&wallet.wallet_id)?;
            if actual != wallet.cached_balance {
                warn!(
                    "Cached balance of {} was {}, actual {}",
                    wallet.wallet_id, wallet.cached_balance, actual
                );
                self.store.set_cached_balance(&wallet.wallet_id, actual)?;
                corrections.push(BalanceCorrection {
                    wallet_id: wallet.wallet_id,
                    cached: wallet.cached_balance,
                    actual,
                });
            }
        }
        info!("Reconciled balances, {} corrected", corrections.len());
        Ok(corrections)
    }

    // =========================================================================
    // Mining & zakat
    // =========================================================================

    /// Mine the whole pending pool into one block
    pub fn trigger_mining(&self, miner: &str) -> LedgerResult<MiningOutcome> {
        self.miner.mine(miner)
    }

    /// As [`Ledger::trigger_mining`], stopping proof of work once `cancel` is set
    pub fn trigger_mining_with_cancel(
        &self,
        miner: &str,
        cancel: &AtomicBool,
    ) -> LedgerResult<MiningOutcome> {
        self.miner.mine_with_cancel(miner, cancel)
    }

    pub fn mining_status(&self) -> LedgerResult<MiningStatus> {
        self.miner.status()
    }

    /// Queue a zakat deduction for every funded wallet
    pub fn run_zakat_batch(&self) -> LedgerResult<ZakatBatchReport> {
        let report = self.zakat.run()?;
        self.audit.record_system(SystemEvent::success(
            "zakat_batch",
            format!(
                "{} deductions queued, {} failed",
                report.deductions.len(),
                report.failures.len()
            ),
        ));
        Ok(report)
    }

    pub fn zakat_history(&self, wallet_id: &str) -> LedgerResult<Vec<ZakatRecord>> {
        self.wallet(wallet_id)?;
        Ok(self.store.zakat_records(wallet_id)?)
    }

    // =========================================================================
    // Chain
    // =========================================================================

    /// All blocks, newest first
    pub fn chain(&self) -> LedgerResult<Vec<Block>> {
        self.chain.chain()
    }

    pub fn chain_stats(&self) -> LedgerResult<ChainStats> {
        self.chain.stats()
    }

    pub fn latest_block(&self) -> LedgerResult<Block> {
        self.chain.latest_block()
    }

    pub fn block_by_hash(&self, hash: &str) -> LedgerResult<Block> {
        self.chain.block_by_hash(hash)
    }

    pub fn validate_chain(&self) -> LedgerResult<ChainValidation> {
        self.chain.validate_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::core::{ErrorKind, GENESIS_PREVIOUS_HASH};
    use crate::mining::SkipReason;
    use crate::storage::MemoryStore;
    use crate::zakat::ZAKAT_POOL_WALLET_ID;

    fn ledger_with(funding: Amount) -> Ledger<MemoryStore> {
        let config = LedgerConfig {
            difficulty: 1,
            initial_wallet_funding: funding,
            ..Default::default()
        };
        Ledger::open(
            Arc::new(MemoryStore::new()),
            config,
            KeySealer::development(),
            Arc::new(MemoryAuditSink::new()),
        )
        .unwrap()
    }

    fn ledger() -> Ledger<MemoryStore> {
        ledger_with(Amount::ZERO)
    }

    fn new_wallet(ledger: &Ledger<MemoryStore>) -> (String, WalletSigner) {
        let created = ledger.create_wallet(None).unwrap();
        let signer = ledger.unseal_signer(&created.sealed_private_key).unwrap();
        assert_eq!(signer.wallet_id(), created.wallet.wallet_id);
        (created.wallet.wallet_id, signer)
    }

    fn mined(outcome: MiningOutcome) -> crate::mining::MinedBlock {
        match outcome {
            MiningOutcome::Mined(mined) => mined,
            other => panic!("expected a mined block, got {other:?}"),
        }
    }

    #[test]
    fn test_open_bootstraps_genesis_and_pool() {
        let ledger = ledger();
        let genesis = ledger.latest_block().unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.merkle_root, "0");
        assert!(ledger.wallet(ZAKAT_POOL_WALLET_ID).is_ok());
        assert!(ledger.validate_chain().unwrap().valid);
    }

    #[test]
    fn test_open_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());
        let config = LedgerConfig::with_difficulty(1);
        let first = Ledger::open(Arc::clone(&store), config.clone(), KeySealer::development(), Arc::clone(&audit))
            .unwrap();
        let genesis = first.latest_block().unwrap();

        let second = Ledger::open(store, config, KeySealer::development(), audit).unwrap();
        assert_eq!(second.latest_block().unwrap(), genesis);
        assert_eq!(second.wallets().unwrap().len(), 1);
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let result = Ledger::open(
            Arc::new(MemoryStore::new()),
            LedgerConfig::with_difficulty(100),
            KeySealer::development(),
            Arc::new(MemoryAuditSink::new()),
        );
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_create_wallet_with_initial_funding() {
        let ledger = ledger_with(Amount::from_coins(100));
        let created = ledger.create_wallet(Some("user-1".into())).unwrap();

        assert_eq!(created.wallet.cached_balance, Amount::from_coins(100));
        assert_eq!(created.wallet.user_id.as_deref(), Some("user-1"));
        assert_eq!(ledger.balance(&created.wallet.wallet_id).unwrap(), Amount::from_coins(100));

        let utxos = ledger.utxos(&created.wallet.wallet_id).unwrap();
        assert_eq!(utxos.len(), 1);
        assert_eq!(utxos[0].tx_id, format!("genesis_{}", created.wallet.wallet_id));
        assert_eq!(utxos[0].block_hash, "genesis");
    }

    #[test]
    fn test_genesis_funding_only_once() {
        let ledger = ledger();
        let (a, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();
        let err = ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(100));

        let err = ledger.fund_from_genesis("nobody", Amount::from_coins(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unseal_rejects_garbage() {
        let ledger = ledger();
        let err = ledger.unseal_signer("not base64!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
    }

    #[test]
    fn test_end_to_end_transfer() {
        let ledger = ledger();
        let genesis = ledger.latest_block().unwrap();
        let (a, signer_a) = new_wallet(&ledger);
        let (b, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        let tx = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_coins(30), "lunch")
            .unwrap();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!((tx.outputs[0].wallet_id.as_str(), tx.outputs[0].amount), (b.as_str(), Amount::from_coins(30)));
        assert_eq!((tx.outputs[1].wallet_id.as_str(), tx.outputs[1].amount), (a.as_str(), Amount::from_coins(70)));

        let tx_id = ledger.submit_transaction(tx).unwrap();
        assert_eq!(ledger.pending().unwrap().len(), 1);
        // Nothing moves until the block is mined
        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(100));

        let mined = mined(ledger.trigger_mining(&b).unwrap());
        assert_eq!(mined.block.index, 1);
        assert_eq!(mined.block.previous_hash, genesis.hash);

        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(70));
        assert_eq!(ledger.balance(&b).unwrap(), Amount::from_coins(30));
        assert_eq!(ledger.wallet(&a).unwrap().cached_balance, Amount::from_coins(70));
        assert_eq!(ledger.wallet(&b).unwrap().cached_balance, Amount::from_coins(30));

        let confirmed = ledger.transaction(&tx_id).unwrap();
        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(confirmed.block_hash, Some(mined.block.hash.clone()));
        assert!(ledger.pending().unwrap().is_empty());
        assert!(ledger.validate_chain().unwrap().valid);
        assert_eq!(ledger.history(&b, None).unwrap()[0].id, tx_id);
        assert!(ledger.reconcile_balances().unwrap().is_empty());
    }

    #[test]
    fn test_transfer_policy() {
        let ledger = ledger();
        let (a, signer_a) = new_wallet(&ledger);
        let (b, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(10)).unwrap();

        let err = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_units(999_999), "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ledger
            .prepare_transfer(&signer_a, &a, Amount::from_coins(1), "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_coins(11), "")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_submit_rejects_tampered_transaction() {
        let ledger = ledger();
        let (a, signer_a) = new_wallet(&ledger);
        let (b, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        let mut tx = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_coins(30), "")
            .unwrap();
        tx.amount = Amount::from_coins(31);
        let err = ledger.submit_transaction(tx).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidSignature));
        assert!(ledger.pending().unwrap().is_empty());
    }

    #[test]
    fn test_double_spend_settled_at_mining() {
        let ledger = ledger();
        let (a, signer_a) = new_wallet(&ledger);
        let (b, _) = new_wallet(&ledger);
        let (c, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        // Both pass validation: the funding output is still unspent
        let first = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_coins(30), "")
            .unwrap();
        let second = ledger
            .prepare_transfer(&signer_a, &c, Amount::from_coins(40), "")
            .unwrap();
        let first_id = ledger.submit_transaction(first).unwrap();
        let second_id = ledger.submit_transaction(second).unwrap();

        let mined = mined(ledger.trigger_mining(&b).unwrap());
        assert_eq!(mined.rejected.len(), 1);
        assert_eq!(mined.rejected[0].kind, ErrorKind::Conflict);

        assert_eq!(ledger.transaction(&first_id).unwrap().status, TxStatus::Confirmed);
        assert_eq!(ledger.transaction(&second_id).unwrap().status, TxStatus::Rejected);
        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(70));
        assert_eq!(ledger.balance(&b).unwrap(), Amount::from_coins(30));
        assert_eq!(ledger.balance(&c).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_spent_output_rejected_at_submission() {
        let ledger = ledger();
        let (a, signer_a) = new_wallet(&ledger);
        let (b, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        let tx = ledger
            .prepare_transfer(&signer_a, &b, Amount::from_coins(30), "")
            .unwrap();
        let replay = tx.clone();
        ledger.submit_transaction(tx).unwrap();
        mined(ledger.trigger_mining(&b).unwrap());

        let err = ledger.submit_transaction(replay).unwrap_err();
        assert!(matches!(err, LedgerError::DoubleSpend(_)));
    }

    #[test]
    fn test_zakat_batch_then_mining() {
        let ledger = ledger();
        let (a, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        let report = ledger.run_zakat_batch().unwrap();
        assert_eq!(report.deductions.len(), 1);
        let deduction = &report.deductions[0];
        assert_eq!(deduction.amount, Amount::from_units(250_000_000));

        let pending = ledger.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tx_type, TxType::ZakatDeduction);
        assert_eq!(pending[0].outputs[1].amount, Amount::from_units(9_750_000_000));

        let mined = mined(ledger.trigger_mining(&a).unwrap());
        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_units(9_750_000_000));
        assert_eq!(
            ledger.balance(ZAKAT_POOL_WALLET_ID).unwrap(),
            Amount::from_units(250_000_000)
        );

        let history = ledger.zakat_history(&a).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].block_hash, mined.block.hash);
    }

    #[test]
    fn test_system_issuance() {
        let ledger = ledger();
        let (a, _) = new_wallet(&ledger);
        ledger
            .issue_system_transaction(&a, Amount::from_coins(50), "Mining reward")
            .unwrap();
        mined(ledger.trigger_mining(&a).unwrap());

        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(50));
        assert_eq!(ledger.wallet(&a).unwrap().cached_balance, Amount::from_coins(50));
        assert_eq!(ledger.chain().unwrap().len(), 2);
    }

    #[test]
    fn test_submit_refuses_issued_value() {
        let ledger = ledger();
        let (m, _) = new_wallet(&ledger);

        let forged = TransactionBuilder::new(
            TxType::MiningReward,
            Sender::SystemIssuance,
            m.clone(),
            Amount::from_coins(1_000_000),
        )
        .add_output(m.clone(), Amount::from_coins(1_000_000))
        .build_with(SYSTEM_SIGNATURE, "x");
        let err = ledger.submit_transaction(forged).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.pending().unwrap().is_empty());
        assert_eq!(ledger.balance(&m).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_submit_refuses_unsigned_zakat() {
        let ledger = ledger();
        let (a, _) = new_wallet(&ledger);
        let (m, _) = new_wallet(&ledger);
        let funding = ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();

        let theft = TransactionBuilder::new(
            TxType::ZakatDeduction,
            Sender::wallet(a.clone()),
            m.clone(),
            Amount::from_coins(100),
        )
        .add_input(crate::core::TxInput {
            tx_id: funding.tx_id.clone(),
            output_index: funding.output_index,
            amount: funding.amount,
        })
        .add_output(m.clone(), Amount::from_coins(100))
        .build_with(ledger.wallet(&a).unwrap().public_key, crate::core::transaction::ZAKAT_SIGNATURE);
        let err = ledger.submit_transaction(theft).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(matches!(
            ledger.trigger_mining(&m).unwrap(),
            MiningOutcome::Skipped(SkipReason::NoPendingTransactions)
        ));
        assert_eq!(ledger.balance(&a).unwrap(), Amount::from_coins(100));
        assert_eq!(ledger.balance(&m).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_mining_with_empty_pool() {
        let ledger = ledger();
        let outcome = ledger.trigger_mining("miner").unwrap();
        assert!(matches!(
            outcome,
            MiningOutcome::Skipped(SkipReason::NoPendingTransactions)
        ));
        assert_eq!(ledger.mining_status().unwrap().latest_block_index, 0);
    }

    #[test]
    fn test_reconcile_repairs_drift() {
        let ledger = ledger();
        let (a, _) = new_wallet(&ledger);
        ledger.fund_from_genesis(&a, Amount::from_coins(100)).unwrap();
        ledger
            .store()
            .set_cached_balance(&a, Amount::from_coins(5))
            .unwrap();

        let corrections = ledger.reconcile_balances().unwrap();
        assert_eq!(
            corrections,
            vec![BalanceCorrection {
                wallet_id: a.clone(),
                cached: Amount::from_coins(5),
                actual: Amount::from_coins(100),
            }]
        );
        assert_eq!(ledger.wallet(&a).unwrap().cached_balance, Amount::from_coins(100));
    }
}
