//! Transaction handling for the ledger
//!
//! Implements the UTXO transaction record: explicit inputs and outputs,
//! a signature over a canonical payload, and a status that moves from
//! pending to confirmed (or rejected) at mining time.

use crate::core::amount::Amount;
use crate::core::utxo::OutPoint;
use crate::crypto::{sha256_hex, KeyError, KeyPair};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Persisted sender id of system-issued transactions
pub const SYSTEM_SENDER: &str = "system";

/// Signature and public key placeholder carried by system-issued transactions
pub const SYSTEM_SIGNATURE: &str = "system";

/// Signature placeholder carried by zakat deductions
pub const ZAKAT_SIGNATURE: &str = "system_zakat";

/// Output index of the recipient output
pub const RECIPIENT_OUTPUT_INDEX: u32 = 0;

/// Output index of the change output
pub const CHANGE_OUTPUT_INDEX: u32 = 1;

// =============================================================================
// Enums
// =============================================================================

/// Who a transaction is from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
    /// A regular wallet
    Wallet(String),
    /// New value created by the system (mining rewards)
    SystemIssuance,
}

impl Sender {
    pub fn wallet(id: impl Into<String>) -> Self {
        Sender::Wallet(id.into())
    }

    /// Persisted string form
    pub fn as_str(&self) -> &str {
        match self {
            Sender::Wallet(id) => id,
            Sender::SystemIssuance => SYSTEM_SENDER,
        }
    }

    /// Wallet id, if this sender is a wallet
    pub fn wallet_id(&self) -> Option<&str> {
        match self {
            Sender::Wallet(id) => Some(id),
            Sender::SystemIssuance => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Sender::SystemIssuance)
    }
}

impl From<String> for Sender {
    fn from(s: String) -> Self {
        if s == SYSTEM_SENDER {
            Sender::SystemIssuance
        } else {
            Sender::Wallet(s)
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::Wallet(id) => id,
            Sender::SystemIssuance => SYSTEM_SENDER.to_string(),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Transfer,
    ZakatDeduction,
    MiningReward,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Transfer => "transfer",
            TxType::ZakatDeduction => "zakat_deduction",
            TxType::MiningReward => "mining_reward",
        }
    }

    /// Whether the validator checks the signature for this type
    pub fn requires_signature(&self) -> bool {
        matches!(self, TxType::Transfer)
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Pending => "pending",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// Transaction input (reference to an existing output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub tx_id: String,
    pub output_index: u32,
    pub amount: Amount,
}

impl TxInput {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id.clone(), self.output_index)
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub wallet_id: String,
    pub amount: Amount,
    pub index: u32,
}

impl TxOutput {
    pub fn new(wallet_id: impl Into<String>, amount: Amount, index: u32) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            amount,
            index,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "txId")]
    pub id: String,
    #[serde(rename = "senderWalletId")]
    pub sender: Sender,
    #[serde(rename = "receiverWalletId")]
    pub receiver: String,
    pub amount: Amount,
    #[serde(default)]
    pub note: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender_public_key: String,
    #[serde(default)]
    pub signature: String,
    #[serde(rename = "inputUtxos", default)]
    pub inputs: Vec<TxInput>,
    #[serde(rename = "outputUtxos", default)]
    pub outputs: Vec<TxOutput>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub fee: Amount,
}

/// Canonical text that a sender signs:
/// `sender || receiver || amount (8 decimals) || timestamp (RFC 3339) || note`
pub fn signing_payload(
    sender: &str,
    receiver: &str,
    amount: Amount,
    timestamp: &DateTime<Utc>,
    note: &str,
) -> String {
    format!(
        "{}{}{}{}{}",
        sender,
        receiver,
        amount,
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        note
    )
}

impl Transaction {
    /// The payload covered by this transaction's signature
    pub fn signing_payload(&self) -> String {
        signing_payload(
            self.sender.as_str(),
            &self.receiver,
            self.amount,
            &self.timestamp,
            &self.note,
        )
    }

    /// Content-derived transaction id
    pub fn calculate_id(&self) -> String {
        let mut data = format!(
            "{}{}{}{}{}{}",
            self.sender,
            self.receiver,
            self.amount,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.note,
            self.tx_type
        );
        for input in &self.inputs {
            data.push_str(&input.outpoint().to_string());
        }
        for output in &self.outputs {
            data.push_str(&format!("{}{}{}", output.index, output.wallet_id, output.amount));
        }
        sha256_hex(data.as_bytes())
    }

    /// Sign the transaction with a wallet key pair
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), KeyError> {
        self.sender_public_key = key_pair.public_key_hex();
        self.signature = key_pair.sign(&self.signing_payload())?;
        Ok(())
    }

    /// Sum of input amounts, `None` on overflow
    pub fn total_input(&self) -> Option<Amount> {
        Amount::checked_sum(self.inputs.iter().map(|i| i.amount))
    }

    /// Sum of output amounts, `None` on overflow
    pub fn total_output(&self) -> Option<Amount> {
        Amount::checked_sum(self.outputs.iter().map(|o| o.amount))
    }

    /// Whether the transaction touches a wallet as sender or receiver
    pub fn involves(&self, wallet_id: &str) -> bool {
        self.sender.wallet_id() == Some(wallet_id) || self.receiver == wallet_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }

    /// Every output reference consumed by this transaction
    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.inputs.iter().map(TxInput::outpoint)
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Builder for assembling a transaction before it is signed
pub struct TransactionBuilder {
    tx_type: TxType,
    sender: Sender,
    receiver: String,
    amount: Amount,
    note: String,
    timestamp: DateTime<Utc>,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl TransactionBuilder {
    pub fn new(tx_type: TxType, sender: Sender, receiver: impl Into<String>, amount: Amount) -> Self {
        Self {
            tx_type,
            sender,
            receiver: receiver.into(),
            amount,
            note: String::new(),
            timestamp: Utc::now(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Attach a free-form note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Override the creation timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add an input
    pub fn add_input(mut self, input: TxInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add several inputs
    pub fn inputs(mut self, inputs: impl IntoIterator<Item = TxInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Add an output at the next free index
    pub fn add_output(mut self, wallet_id: impl Into<String>, amount: Amount) -> Self {
        let index = self.outputs.len() as u32;
        self.outputs.push(TxOutput::new(wallet_id, amount, index));
        self
    }

    /// Add several pre-indexed outputs
    pub fn outputs(mut self, outputs: impl IntoIterator<Item = TxOutput>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    /// Build and sign the transaction
    pub fn build_and_sign(self, key_pair: &KeyPair) -> Result<Transaction, KeyError> {
        let mut tx = self.build_with(String::new(), String::new());
        tx.sign(key_pair)?;
        Ok(tx)
    }

    /// Build with fixed public key and signature placeholders
    pub fn build_with(self, public_key: impl Into<String>, signature: impl Into<String>) -> Transaction {
        let mut tx = Transaction {
            id: String::new(),
            sender: self.sender,
            receiver: self.receiver,
            amount: self.amount,
            note: self.note,
            timestamp: self.timestamp,
            sender_public_key: public_key.into(),
            signature: signature.into(),
            inputs: self.inputs,
            outputs: self.outputs,
            tx_type: self.tx_type,
            status: TxStatus::Pending,
            block_hash: None,
            fee: Amount::ZERO,
        };
        tx.id = tx.calculate_id();
        tx
    }
}
