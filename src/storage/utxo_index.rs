//! UTXO index over the ledger store
//!
//! Answers "what can this wallet spend" and performs the greedy input
//! selection used for transfers and zakat deductions. Mutations go through
//! the store's single-record operations, so spending is a compare-and-swap.

use crate::core::amount::Amount;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::transaction::{TxInput, TxOutput, CHANGE_OUTPUT_INDEX, RECIPIENT_OUTPUT_INDEX};
use crate::core::utxo::{OutPoint, SpendOutcome, Utxo};
use crate::storage::store::LedgerStore;
use std::sync::Arc;

/// Inputs chosen to cover a target amount
#[derive(Debug, Clone, PartialEq)]
pub struct InputSelection {
    pub inputs: Vec<TxInput>,
    pub total: Amount,
    pub target: Amount,
}

impl InputSelection {
    /// Surplus returned to the spender
    pub fn change(&self) -> Amount {
        self.total.saturating_sub(self.target)
    }

    /// Outputs paying `target` to the recipient at index 0 and any change
    /// back to `change_to` at index 1
    pub fn outputs(&self, recipient: &str, change_to: &str) -> Vec<TxOutput> {
        let mut outputs = vec![TxOutput::new(recipient, self.target, RECIPIENT_OUTPUT_INDEX)];
        let change = self.change();
        if !change.is_zero() {
            outputs.push(TxOutput::new(change_to, change, CHANGE_OUTPUT_INDEX));
        }
        outputs
    }
}

/// Store-backed UTXO index
pub struct UtxoIndex<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for UtxoIndex<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> UtxoIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Unspent outputs owned by a wallet, in creation order
    pub fn unspent(&self, wallet_id: &str) -> LedgerResult<Vec<Utxo>> {
        Ok(self.store.unspent_utxos(wallet_id)?)
    }

    /// Spendable balance: the sum of unspent outputs
    pub fn balance(&self, wallet_id: &str) -> LedgerResult<Amount> {
        let utxos = self.unspent(wallet_id)?;
        Amount::checked_sum(utxos.iter().map(|u| u.amount))
            .ok_or_else(|| LedgerError::validation("balance overflow"))
    }

    /// Look up a single output
    pub fn get(&self, outpoint: &OutPoint) -> LedgerResult<Option<Utxo>> {
        Ok(self.store.utxo(outpoint)?)
    }

    /// Greedily select unspent outputs, oldest first, until they cover `target`
    pub fn select_inputs(&self, wallet_id: &str, target: Amount) -> LedgerResult<InputSelection> {
        let mut inputs = Vec::new();
        let mut total = Amount::ZERO;

        for utxo in self.unspent(wallet_id)? {
            if total >= target && !inputs.is_empty() {
                break;
            }
            total = total
                .checked_add(utxo.amount)
                .ok_or_else(|| LedgerError::validation("input sum overflow"))?;
            inputs.push(TxInput {
                tx_id: utxo.tx_id,
                output_index: utxo.output_index,
                amount: utxo.amount,
            });
        }

        if total < target || inputs.is_empty() {
            return Err(LedgerError::InsufficientBalance {
                available: total,
                required: target,
            });
        }

        Ok(InputSelection {
            inputs,
            total,
            target,
        })
    }

    /// Spend an output on behalf of `spender_tx_id`. Returns `true` if this
    /// call performed the spend.
    ///
    /// Spending an output already spent by the same transaction is a no-op,
    /// which keeps a retried materialization idempotent.
    pub fn spend(&self, outpoint: &OutPoint, spender_tx_id: &str) -> LedgerResult<bool> {
        match self.store.mark_spent(outpoint, spender_tx_id)? {
            SpendOutcome::Spent => Ok(true),
            SpendOutcome::AlreadySpentBySame => Ok(false),
            SpendOutcome::SpentByOther(other) => Err(LedgerError::Conflict(format!(
                "UTXO {outpoint} already spent in {other}"
            ))),
            SpendOutcome::Missing => Err(LedgerError::UtxoNotFound(outpoint.clone())),
        }
    }

    /// Create an output. Returns `false` if it already existed.
    pub fn create(&self, utxo: &Utxo) -> LedgerResult<bool> {
        Ok(self.store.insert_utxo(utxo)?)
    }
}
