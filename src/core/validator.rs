//! Transaction validation
//!
//! Checks run in a fixed order and the first failure is returned:
//!
//! 1. the sender wallet exists and may send this type (only mining rewards
//!    come from system issuance)
//! 2. the receiver wallet exists (not for mining rewards)
//! 3. the signature verifies under the sender's own key (transfers only)
//! 4. every input is an existing, unspent output owned by the sender
//! 5. inputs cover outputs
//! 6. amounts, output indices, zakat routing and the id are well formed

use crate::core::amount::Amount;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::transaction::{Sender, Transaction, TxType, RECIPIENT_OUTPUT_INDEX};
use crate::crypto::{verify_signature, wallet_id_from_public_key_hex};
use crate::storage::{LedgerStore, UtxoIndex};
use crate::zakat::ZAKAT_POOL_WALLET_ID;
use std::collections::HashSet;
use std::sync::Arc;

/// Validates transactions against the current store state
pub struct TransactionValidator<S: LedgerStore> {
    store: Arc<S>,
    utxos: UtxoIndex<S>,
    /// The only wallet a zakat deduction may pay
    zakat_pool: String,
}

impl<S: LedgerStore> Clone for TransactionValidator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            utxos: self.utxos.clone(),
            zakat_pool: self.zakat_pool.clone(),
        }
    }
}

impl<S: LedgerStore> TransactionValidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        let utxos = UtxoIndex::new(Arc::clone(&store));
        Self {
            store,
            utxos,
            zakat_pool: ZAKAT_POOL_WALLET_ID.to_string(),
        }
    }

    /// Validator for a ledger whose zakat pool is `pool_wallet_id`
    pub fn with_zakat_pool(mut self, pool_wallet_id: impl Into<String>) -> Self {
        self.zakat_pool = pool_wallet_id.into();
        self
    }

    /// Run every check; stored state is never modified
    pub fn validate(&self, tx: &Transaction) -> LedgerResult<()> {
        self.check_sender(tx)?;
        self.check_receiver(tx)?;
        self.check_signature(tx)?;
        let input_sum = self.check_inputs(tx)?;
        self.check_balance(tx, input_sum)?;
        self.check_structure(tx)
    }

    fn check_sender(&self, tx: &Transaction) -> LedgerResult<()> {
        match (&tx.sender, tx.tx_type) {
            (Sender::SystemIssuance, TxType::MiningReward) => Ok(()),
            (Sender::Wallet(id), TxType::Transfer | TxType::ZakatDeduction) => {
                match self.store.wallet(id)? {
                    Some(_) => Ok(()),
                    None => Err(LedgerError::InvalidSender(id.clone())),
                }
            }
            _ => Err(LedgerError::InvalidSender(tx.sender.to_string())),
        }
    }

    fn check_receiver(&self, tx: &Transaction) -> LedgerResult<()> {
        if tx.tx_type == TxType::MiningReward {
            return Ok(());
        }
        match self.store.wallet(&tx.receiver)? {
            Some(_) => Ok(()),
            None => Err(LedgerError::InvalidReceiver(tx.receiver.clone())),
        }
    }

    fn check_signature(&self, tx: &Transaction) -> LedgerResult<()> {
        if !tx.tx_type.requires_signature() {
            return Ok(());
        }
        // The key must be the sender's own, not merely a valid one
        match tx.sender.wallet_id() {
            Some(sender) if wallet_id_from_public_key_hex(&tx.sender_public_key) == sender => {}
            _ => return Err(LedgerError::InvalidSignature),
        }
        if verify_signature(&tx.sender_public_key, &tx.signing_payload(), &tx.signature)? {
            Ok(())
        } else {
            Err(LedgerError::InvalidSignature)
        }
    }

    /// Resolve every input, returning the sum of their stored amounts
    fn check_inputs(&self, tx: &Transaction) -> LedgerResult<Amount> {
        let mut seen = HashSet::new();
        let mut total = Amount::ZERO;

        for input in &tx.inputs {
            let outpoint = input.outpoint();
            if !seen.insert(outpoint.clone()) {
                return Err(LedgerError::DoubleSpend(outpoint));
            }

            let utxo = self
                .utxos
                .get(&outpoint)?
                .ok_or_else(|| LedgerError::UtxoNotFound(outpoint.clone()))?;
            if utxo.is_spent {
                return Err(LedgerError::DoubleSpend(outpoint));
            }
            if tx.sender.wallet_id() != Some(utxo.wallet_id.as_str()) {
                return Err(LedgerError::validation(format!(
                    "UTXO {outpoint} is not owned by the sender"
                )));
            }
            if utxo.amount != input.amount {
                return Err(LedgerError::validation(format!(
                    "input {outpoint} claims {} but holds {}",
                    input.amount, utxo.amount
                )));
            }

            total = total
                .checked_add(utxo.amount)
                .ok_or_else(|| LedgerError::validation("input sum overflow"))?;
        }

        Ok(total)
    }

    fn check_balance(&self, tx: &Transaction, input_sum: Amount) -> LedgerResult<()> {
        // Issued value has no inputs to cover it
        if tx.sender.is_system() {
            return Ok(());
        }
        let output_sum = tx
            .total_output()
            .ok_or_else(|| LedgerError::validation("output sum overflow"))?;
        if input_sum < output_sum {
            return Err(LedgerError::InsufficientBalance {
                available: input_sum,
                required: output_sum,
            });
        }
        Ok(())
    }

    fn check_structure(&self, tx: &Transaction) -> LedgerResult<()> {
        if tx.amount.is_zero() {
            return Err(LedgerError::validation("amount must be positive"));
        }
        if tx.outputs.is_empty() {
            return Err(LedgerError::validation("transaction has no outputs"));
        }
        let mut indices = HashSet::new();
        for output in &tx.outputs {
            if output.amount.is_zero() {
                return Err(LedgerError::validation(format!(
                    "output {} has a zero amount",
                    output.index
                )));
            }
            if !indices.insert(output.index) {
                return Err(LedgerError::validation(format!(
                    "duplicate output index {}",
                    output.index
                )));
            }
        }
        if tx.tx_type == TxType::ZakatDeduction {
            self.check_zakat_routing(tx)?;
        }
        if tx.id != tx.calculate_id() {
            return Err(LedgerError::validation(format!(
                "transaction id {} does not match its contents",
                tx.id
            )));
        }
        Ok(())
    }

    /// A deduction pays the levy to the pool and any change back to the sender
    fn check_zakat_routing(&self, tx: &Transaction) -> LedgerResult<()> {
        if tx.receiver != self.zakat_pool {
            return Err(LedgerError::InvalidReceiver(tx.receiver.clone()));
        }
        let mut levy_paid = false;
        for output in &tx.outputs {
            let expected = if output.index == RECIPIENT_OUTPUT_INDEX {
                levy_paid = output.amount == tx.amount;
                self.zakat_pool.as_str()
            } else {
                tx.sender.as_str()
            };
            if output.wallet_id != expected {
                return Err(LedgerError::validation(format!(
                    "zakat output {} pays {} instead of {}",
                    output.index, output.wallet_id, expected
                )));
            }
        }
        if !levy_paid {
            return Err(LedgerError::validation("zakat levy is not paid to the pool"));
        }
        Ok(())
    }
}
