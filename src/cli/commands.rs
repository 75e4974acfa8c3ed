//! CLI commands for the ledger
//!
//! Implements all command handlers for the CLI interface.

use crate::audit::FileAuditSink;
use crate::config::{sealer_from_key, LedgerConfig, CONFIG_FILE};
use crate::core::Amount;
use crate::crypto::KeySealer;
use crate::ledger::Ledger;
use crate::mining::{MiningOutcome, SkipReason};
use crate::storage::{MemoryStore, SnapshotStorage};
use crate::wallet::KeyStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn short(s: &str) -> &str {
    &s[..s.len().min(16)]
}

/// Application state
pub struct AppState {
    pub ledger: Arc<Ledger<MemoryStore>>,
    pub storage: Arc<SnapshotStorage>,
    pub keys: KeyStore,
    pub sealer: KeySealer,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load the ledger under `data_dir`, creating it if absent
    pub fn open(data_dir: &Path, seal_key: Option<&str>, difficulty: Option<u32>) -> CliResult<Self> {
        let storage = Arc::new(SnapshotStorage::in_dir(data_dir)?);

        let mut config = LedgerConfig::load_or_default(&data_dir.join(CONFIG_FILE))?;
        if let Some(d) = difficulty {
            config.difficulty = d;
        }

        let store = storage.load_or_default()?;
        let sealer = sealer_from_key(seal_key)?;
        let audit = Arc::new(FileAuditSink::new(data_dir.join("logs"))?);
        let ledger = Ledger::open(Arc::new(store), config, sealer.clone(), audit)?;
        let keys = KeyStore::new(&data_dir.join("wallets"))?;

        Ok(Self {
            ledger: Arc::new(ledger),
            storage,
            keys,
            sealer,
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(self.ledger.store())?;
        Ok(())
    }
}

/// Initialize a new ledger
pub fn cmd_init(data_dir: &Path, difficulty: Option<u32>, seal_key: Option<&str>) -> CliResult<()> {
    let storage = SnapshotStorage::in_dir(data_dir)?;
    if storage.exists() {
        println!("⚠️  Ledger already exists at {:?}", data_dir);
        return Ok(());
    }

    let config = match difficulty {
        Some(d) => LedgerConfig::with_difficulty(d),
        None => LedgerConfig::default(),
    };
    config.validate()?;
    config.save(&data_dir.join(CONFIG_FILE))?;

    let state = AppState::open(data_dir, seal_key, None)?;
    state.save()?;

    let genesis = state.ledger.latest_block()?;
    println!("✅ Ledger initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔧 Difficulty: {}", config.difficulty);
    println!("   🧱 Genesis block hash: {}", genesis.hash);
    println!("   🏦 Zakat pool wallet: {}", config.zakat_pool_wallet_id);

    Ok(())
}

/// Create a new wallet
pub fn cmd_wallet_new(state: &AppState, user_id: Option<String>) -> CliResult<()> {
    let created = state.ledger.create_wallet(user_id)?;
    let wallet = &created.wallet;
    state.keys.save(&wallet.wallet_id, &created.sealed_private_key)?;
    state.save()?;

    println!("🔐 New wallet created!");
    println!("   📍 Wallet ID: {}", wallet.wallet_id);
    println!("   🔑 Public Key: {}...", short(&wallet.public_key));
    println!("   💰 Balance: {} coins", wallet.cached_balance);
    println!("\n   ⚠️  IMPORTANT: Your sealed private key is stored in the wallets directory.");
    println!("   Back up this directory and the sealing key to keep access to your funds!");

    Ok(())
}

/// List all wallets
pub fn cmd_wallet_list(state: &AppState) -> CliResult<()> {
    let wallets = state.ledger.wallets()?;
    let local = state.keys.list()?;

    println!("📋 Wallets:");
    for wallet in &wallets {
        let marker = if local.contains(&wallet.wallet_id) { "🔑" } else { "  " };
        println!(
            "   {} {} - {} coins",
            marker, wallet.wallet_id, wallet.cached_balance
        );
    }

    Ok(())
}

/// Get wallet balance
pub fn cmd_wallet_balance(state: &AppState, wallet_id: &str) -> CliResult<()> {
    let balance = state.ledger.balance(wallet_id)?;
    let wallet = state.ledger.wallet(wallet_id)?;
    let utxos = state.ledger.utxos(wallet_id)?;

    println!("💰 Balance for {}", wallet_id);
    println!("   Total: {} coins", balance);
    if wallet.cached_balance != balance {
        println!("   ⚠️  Cached: {} coins (run `reconcile`)", wallet.cached_balance);
    }
    println!("   UTXOs: {}", utxos.len());

    if !utxos.is_empty() {
        println!("\n   Transaction outputs:");
        for utxo in utxos.iter().take(10) {
            println!(
                "   └─ {}:{} = {} coins",
                short(&utxo.tx_id),
                utxo.output_index,
                utxo.amount
            );
        }
        if utxos.len() > 10 {
            println!("   ... and {} more", utxos.len() - 10);
        }
    }

    let zakat = state.ledger.zakat_history(wallet_id)?;
    if !zakat.is_empty() {
        println!("\n   Zakat paid:");
        for record in &zakat {
            let status = if record.block_hash.is_empty() { "pending" } else { "mined" };
            println!(
                "   └─ {} | {} coins | {}",
                record.date.format("%Y-%m-%d"),
                record.amount,
                status
            );
        }
    }

    Ok(())
}

/// Send coins
pub fn cmd_send(state: &AppState, from: &str, to: &str, amount: Amount, note: &str) -> CliResult<()> {
    let signer = state.keys.signer(from, &state.sealer)?;
    let tx = state.ledger.prepare_transfer(&signer, to, amount, note)?;

    println!("📤 Transaction created:");
    println!("   ID: {}", tx.id);
    println!("   From: {}", from);
    println!("   To: {}", to);
    println!("   Amount: {} coins", amount);

    state.ledger.submit_transaction(tx)?;
    state.save()?;

    println!("\n✅ Transaction queued as pending");
    println!("   It will be included in the next mined block.");

    Ok(())
}

/// Mine the pending pool into a block
pub fn cmd_mine(state: &AppState, miner: &str) -> CliResult<()> {
    println!("⛏️  Mining for wallet: {}", miner);
    println!("   Current difficulty: {}", state.ledger.config().difficulty);

    let outcome = state.ledger.trigger_mining(miner)?;
    state.save()?;

    match outcome {
        MiningOutcome::Mined(mined) => {
            let block = &mined.block;
            println!("\n   Block {} mined!", block.index);
            println!("   ├─ Hash: {}", short(&block.hash));
            println!("   ├─ Transactions: {}", block.tx_count());
            println!("   ├─ Time: {}ms", mined.stats.time_ms);
            println!("   ├─ Attempts: {}", mined.stats.hash_attempts);
            println!("   └─ Hash rate: {:.2} H/s", mined.stats.hash_rate);
            for rejected in &mined.rejected {
                println!("   ❌ Rejected {}: {}", short(&rejected.tx_id), rejected.reason);
            }
        }
        MiningOutcome::Skipped(SkipReason::NoPendingTransactions) => {
            println!("📭 No pending transactions to mine");
        }
        MiningOutcome::Skipped(SkipReason::MiningInProgress) => {
            println!("⏳ Mining already in progress");
        }
        MiningOutcome::Skipped(SkipReason::AllRejected(rejected)) => {
            println!("❌ All {} pending transactions were rejected", rejected.len());
            for r in &rejected {
                println!("   └─ {}: {}", short(&r.tx_id), r.reason);
            }
        }
        MiningOutcome::Cancelled { attempts } => {
            println!("🛑 Mining cancelled after {} attempts", attempts);
        }
    }

    Ok(())
}

/// Queue zakat deductions for every funded wallet
pub fn cmd_zakat(state: &AppState) -> CliResult<()> {
    println!("🕌 Running zakat batch...");
    let report = state.ledger.run_zakat_batch()?;
    state.save()?;

    for deduction in &report.deductions {
        println!(
            "   └─ {}: {} of {} coins",
            deduction.wallet_id, deduction.amount, deduction.balance
        );
    }
    for failure in &report.failures {
        println!("   ❌ {}: {}", failure.wallet_id, failure.reason);
    }
    println!(
        "\n✅ {} deductions queued ({} coins), {} skipped, {} failed",
        report.deductions.len(),
        report.total_deducted(),
        report.skipped.len(),
        report.failures.len()
    );
    println!("   Deductions take effect when the next block is mined.");

    Ok(())
}

/// Display chain info
pub fn cmd_chain_info(state: &AppState) -> CliResult<()> {
    let stats = state.ledger.chain_stats()?;
    let status = state.ledger.mining_status()?;

    println!("⛓️  Ledger Info");
    println!("   ├─ Height: {}", stats.height);
    println!("   ├─ Total blocks: {}", stats.total_blocks);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Pending transactions: {}", status.pending_transactions);
    println!("   ├─ Difficulty: {}", stats.difficulty);
    println!("   └─ Latest hash: {}...", short(&stats.latest_hash));

    Ok(())
}

/// List recent blocks
pub fn cmd_chain_blocks(state: &AppState, count: usize) -> CliResult<()> {
    println!("🧱 Recent blocks:");
    for block in state.ledger.chain()?.iter().take(count) {
        println!(
            "   #{} | {} | {} tx | {}",
            block.index,
            short(&block.hash),
            block.tx_count(),
            block.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Validate the chain
pub fn cmd_validate(state: &AppState) -> CliResult<()> {
    println!("🔍 Validating chain...");

    let result = state.ledger.validate_chain()?;
    match result.violation {
        None => {
            println!("✅ Chain is valid!");
            println!("   {} blocks verified", result.blocks_checked);
        }
        Some(v) => {
            println!("❌ Chain validation FAILED!");
            match v.previous_index {
                Some(prev) => println!("   {:?} between blocks {} and {}", v.kind, prev, v.index),
                None => println!("   {:?} at block {}", v.kind, v.index),
            }
            println!("   The chain may have been tampered with.");
        }
    }

    Ok(())
}

/// Show the pending pool
pub fn cmd_pending(state: &AppState) -> CliResult<()> {
    let pending = state.ledger.pending()?;
    println!("📬 Pending transactions: {}", pending.len());

    for tx in pending.iter().take(10) {
        println!(
            "   └─ {} | {} | {} → {} | {} coins",
            short(&tx.id),
            tx.tx_type,
            tx.sender,
            tx.receiver,
            tx.amount
        );
    }
    if pending.len() > 10 {
        println!("   ... and {} more", pending.len() - 10);
    }

    Ok(())
}

/// Recompute cached balances from unspent outputs
pub fn cmd_reconcile(state: &AppState) -> CliResult<()> {
    let corrections = state.ledger.reconcile_balances()?;
    state.save()?;

    if corrections.is_empty() {
        println!("✅ All cached balances match their UTXOs");
    } else {
        println!("🔧 Corrected {} balances:", corrections.len());
        for c in &corrections {
            println!("   └─ {}: {} → {}", c.wallet_id, c.cached, c.actual);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), Some(1), None).unwrap();

        let state = AppState::open(dir.path(), None, None).unwrap();
        cmd_wallet_new(&state, None).unwrap();
        cmd_wallet_new(&state, None).unwrap();
        let ids = state.keys.list().unwrap();
        assert_eq!(ids.len(), 2);

        cmd_send(&state, &ids[0], &ids[1], Amount::from_coins(25), "test").unwrap();
        cmd_mine(&state, &ids[1]).unwrap();
        drop(state);

        let reopened = AppState::open(dir.path(), None, None).unwrap();
        assert_eq!(reopened.ledger.config().difficulty, 1);
        assert_eq!(reopened.ledger.chain().unwrap().len(), 2);
        assert_eq!(reopened.ledger.balance(&ids[0]).unwrap(), Amount::from_coins(75));
        assert_eq!(reopened.ledger.balance(&ids[1]).unwrap(), Amount::from_coins(125));
        assert!(reopened.ledger.validate_chain().unwrap().valid);
        assert!(dir.path().join("logs").join("transactions.log").exists());
    }

    #[test]
    fn test_send_requires_local_key() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path(), None, Some(1)).unwrap();
        assert!(cmd_send(&state, "nobody", "else", Amount::from_coins(1), "").is_err());
    }
}
