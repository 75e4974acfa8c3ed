//! Audit sink implementations

use crate::audit::events::{SystemEvent, TransactionEvent};
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Receiver of audit events. Implementations must not panic or block for long.
pub trait AuditSink: Send + Sync {
    fn record_system(&self, event: SystemEvent);

    fn record_transaction(&self, event: TransactionEvent);
}

/// Writes audit events to the `audit` log target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl LogAuditSink {
    fn emit<T: Serialize>(kind: &str, event: &T) {
        match serde_json::to_string(event) {
            Ok(json) => info!(target: "audit", "{} {}", kind, json),
            Err(e) => warn!(target: "audit", "Failed to encode {} event: {}", kind, e),
        }
    }
}

impl AuditSink for LogAuditSink {
    fn record_system(&self, event: SystemEvent) {
        Self::emit("system", &event);
    }

    fn record_transaction(&self, event: TransactionEvent) {
        Self::emit("transaction", &event);
    }
}

/// Keeps events in memory; used by tests and short-lived tools
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    system: Mutex<Vec<SystemEvent>>,
    transactions: Mutex<Vec<TransactionEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_events(&self) -> Vec<SystemEvent> {
        self.system.lock().clone()
    }

    pub fn transaction_events(&self) -> Vec<TransactionEvent> {
        self.transactions.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_system(&self, event: SystemEvent) {
        self.system.lock().push(event);
    }

    fn record_transaction(&self, event: TransactionEvent) {
        self.transactions.lock().push(event);
    }
}

/// Appends events as JSON lines to `system.log` and `transactions.log`
#[derive(Debug)]
pub struct FileAuditSink {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn append<T: Serialize>(&self, file: &str, event: &T) {
        let path = self.dir.join(file);
        let _guard = self.lock.lock();
        if let Err(e) = append_json_line(&path, event) {
            warn!(target: "audit", "Failed to write audit event to {}: {}", path.display(), e);
        }
    }
}

fn append_json_line<T: Serialize>(path: &Path, event: &T) -> std::io::Result<()> {
    let line = serde_json::to_string(event)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

impl AuditSink for FileAuditSink {
    fn record_system(&self, event: SystemEvent) {
        self.append("system.log", &event);
    }

    fn record_transaction(&self, event: TransactionEvent) {
        self.append("transactions.log", &event);
    }
}
