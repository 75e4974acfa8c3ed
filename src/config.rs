//! Ledger configuration
//!
//! Tunables live in a small JSON file next to the ledger snapshot. The
//! sealing key is never part of it: it comes from the environment (or the
//! command line) and falls back to a development key with a warning.

use crate::core::{Amount, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::crypto::{KeySealer, SealError};
use crate::zakat::{ZakatPolicy, DEFAULT_ZAKAT_RATE_BPS, ZAKAT_POOL_WALLET_ID};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable holding the private key sealing key
pub const SEAL_KEY_ENV: &str = "ZAKAT_LEDGER_SEAL_KEY";

/// Default config file name inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Difficulty {0} exceeds the maximum of {MAX_DIFFICULTY}")]
    DifficultyTooHigh(u32),
    #[error("Zakat rate {0} bps is above 100%")]
    RateTooHigh(u32),
    #[error("Zakat pool wallet id must not be empty")]
    EmptyPoolWallet,
    #[error("Invalid sealing key: {0}")]
    SealKey(#[from] SealError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ledger tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerConfig {
    /// Leading zero hex characters required of a block hash
    pub difficulty: u32,
    pub zakat_rate_bps: u32,
    pub zakat_pool_wallet_id: String,
    /// Genesis funding granted to each new wallet; zero disables it
    pub initial_wallet_funding: Amount,
    /// Smallest amount a transfer may carry
    pub min_transfer: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            zakat_rate_bps: DEFAULT_ZAKAT_RATE_BPS,
            zakat_pool_wallet_id: ZAKAT_POOL_WALLET_ID.to_string(),
            initial_wallet_funding: Amount::from_coins(100),
            min_transfer: Amount::from_units(1_000_000),
        }
    }
}

impl LedgerConfig {
    /// Config with a different difficulty
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }
        if u64::from(self.zakat_rate_bps) > crate::core::BASIS_POINTS {
            return Err(ConfigError::RateTooHigh(self.zakat_rate_bps));
        }
        if self.zakat_pool_wallet_id.trim().is_empty() {
            return Err(ConfigError::EmptyPoolWallet);
        }
        Ok(())
    }

    /// Zakat rate and destination
    pub fn zakat_policy(&self) -> ZakatPolicy {
        ZakatPolicy {
            rate_bps: self.zakat_rate_bps,
            pool_wallet_id: self.zakat_pool_wallet_id.clone(),
        }
    }

    /// Load from a JSON file, or defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Build the private key sealer from configured key material
pub fn sealer_from_key(key: Option<&str>) -> Result<KeySealer, ConfigError> {
    match key {
        Some(material) => Ok(KeySealer::new(material.as_bytes())?),
        None => {
            warn!(
                "{} is not set, sealing wallet keys with the development key",
                SEAL_KEY_ENV
            );
            Ok(KeySealer::development())
        }
    }
}
