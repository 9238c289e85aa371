//! Audit sink implementations

use crate::core::traits::AuditSink;
use crate::types::AuditEntry;
use std::sync::Mutex;
use tracing::info;

/// Emits each audit entry as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        let before = entry.before.as_ref().map(ToString::to_string);
        let after = entry.after.as_ref().map(ToString::to_string);
        info!(
            target: "fee_ledger::audit",
            actor = entry.actor,
            action = %entry.action,
            table = entry.table,
            record_id = entry.record_id,
            before = before.as_deref(),
            after = after.as_deref(),
            "audit"
        );
    }
}

/// Keeps audit entries in memory, in the order they were recorded
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry recorded so far
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuditAction;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryAuditLog::new();
        log.record(AuditEntry::new(1, AuditAction::Create, "invoices", 1));
        log.record(AuditEntry::new(1, AuditAction::Void, "invoices", 1));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[1].action, AuditAction::Void);
    }

    #[test]
    fn test_memory_log_concurrent_writers() {
        let log = Arc::new(MemoryAuditLog::new());
        let mut handles = vec![];

        for i in 0..8u64 {
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                log.record(AuditEntry::new(1, AuditAction::Create, "payments", i));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 8);
    }

    #[test]
    fn test_tracing_sink_accepts_snapshots() {
        let entry = AuditEntry::new(7, AuditAction::Update, "students", 3)
            .before(&serde_json::json!({"balance": 0}))
            .after(&serde_json::json!({"balance": 100}));
        TracingAuditSink.record(entry);
    }
}
