//! Audit trail
//!
//! The engine reports what it did to an [`AuditSink`]. Recording is
//! fire-and-forget: a sink that fails logs the failure itself and never
//! aborts the operation that produced the event.

pub mod events;
pub mod sink;

pub use events::{EventStatus, SystemEvent, TransactionAction, TransactionEvent};
pub use sink::{AuditSink, FileAuditSink, LogAuditSink, MemoryAuditSink};
