//! Ledger persistence layer
//!
//! Saves and loads the in-memory store as a single JSON snapshot, with a
//! temp-file-then-rename write and rotating backups.

use crate::storage::memory::{MemoryStore, StoreSnapshot};
use crate::storage::store::StoreError;
use log::{debug, info};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub snapshot_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".zakat_ledger"),
            snapshot_file: "ledger.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Snapshot storage manager
pub struct SnapshotStorage {
    config: StorageConfig,
}

impl SnapshotStorage {
    /// Create a new storage manager, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Create rooted at a data directory with default file names
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::new(StorageConfig {
            data_dir: data_dir.into(),
            ..Default::default()
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn snapshot_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.snapshot_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.snapshot_file, index))
    }

    /// Save the store to disk
    pub fn save(&self, store: &MemoryStore) -> Result<(), StorageError> {
        let path = self.snapshot_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let snapshot = store.snapshot();
        let temp_path = self.config.data_dir.join("ledger.tmp");
        {
            let file = fs::File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &snapshot)?;
        }
        fs::rename(&temp_path, &path)?;

        debug!(
            "Saved ledger snapshot: {} blocks, {} transactions, {} wallets",
            snapshot.blocks.len(),
            snapshot.transactions.len(),
            snapshot.wallets.len()
        );
        Ok(())
    }

    /// Load the store from disk
    pub fn load(&self) -> Result<MemoryStore, StorageError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Ledger snapshot not found".to_string(),
            ));
        }
        let store = read_snapshot(&path)?;
        info!("Loaded ledger snapshot from {}", path.display());
        Ok(store)
    }

    /// Load the snapshot if one exists, otherwise start empty
    pub fn load_or_default(&self) -> Result<MemoryStore, StorageError> {
        if self.exists() {
            self.load()
        } else {
            Ok(MemoryStore::new())
        }
    }

    /// Check if a saved snapshot exists
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Restore from a backup
    pub fn restore_backup(&self, backup_index: usize) -> Result<MemoryStore, StorageError> {
        let backup_path = self.backup_path(backup_index);
        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }
        read_snapshot(&backup_path)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

fn read_snapshot(path: &Path) -> Result<MemoryStore, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
    Ok(MemoryStore::from_snapshot(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::amount::Amount;
    use crate::core::block::Block;
    use crate::core::utxo::Utxo;
    use crate::core::wallet::Wallet;
    use crate::storage::store::LedgerStore;

    #[test]
    fn test_save_load_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SnapshotStorage::in_dir(temp_dir.path()).unwrap();

        let store = MemoryStore::new();
        store.append_block(&Block::genesis(2)).unwrap();
        store.insert_wallet(&Wallet::new("w", "pk", None)).unwrap();
        store
            .insert_utxo(&Utxo::genesis_funding("w", Amount::from_coins(100)))
            .unwrap();

        assert!(!storage.exists());
        storage.save(&store).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.block_count().unwrap(), 1);
        assert_eq!(loaded.unspent_utxos("w").unwrap().len(), 1);
        assert_eq!(
            loaded.latest_block().unwrap().unwrap().hash,
            store.latest_block().unwrap().unwrap().hash
        );
    }

    #[test]
    fn test_load_or_default_when_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SnapshotStorage::in_dir(temp_dir.path()).unwrap();
        let store = storage.load_or_default().unwrap();
        assert_eq!(store.block_count().unwrap(), 0);
        assert!(storage.load().is_err());
    }

    #[test]
    fn test_backup_rotation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = SnapshotStorage::new(StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
            max_backups: 3,
            ..Default::default()
        })
        .unwrap();

        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_wallet(&Wallet::new(format!("w{i}"), "pk", None))
                .unwrap();
            storage.save(&store).unwrap();
        }

        assert_eq!(storage.list_backups(), vec![0, 1, 2]);
        // Newest backup holds the state before the last save
        let restored = storage.restore_backup(0).unwrap();
        assert_eq!(restored.wallets().unwrap().len(), 4);
    }
}
