//! Storage module for ledger persistence
//!
//! - `store`: the [`LedgerStore`] trait the engine is written against
//! - `memory`: a thread-safe in-memory implementation
//! - `persistence`: JSON snapshots of the memory store with backups
//! - `utxo_index`: spendable-output queries and input selection

pub mod memory;
pub mod persistence;
pub mod store;
pub mod utxo_index;

pub use memory::{MemoryStore, StoreSnapshot};
pub use persistence::{SnapshotStorage, StorageConfig, StorageError};
pub use store::{LedgerStore, StoreError, StoreResult};
pub use utxo_index::{InputSelection, UtxoIndex};
