//! Audit-log entry types

use super::ids::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// What a mutating operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Void,
    Import,
    Match,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Void => "VOID",
            AuditAction::Import => "IMPORT",
            AuditAction::Match => "MATCH",
        };
        f.write_str(name)
    }
}

/// One audit-log record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: AuditAction,
    /// Logical table the record lives in, e.g. "payments"
    pub table: &'static str,
    pub record_id: u64,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: UserId, action: AuditAction, table: &'static str, record_id: u64) -> Self {
        AuditEntry {
            actor,
            action,
            table,
            record_id,
            before: None,
            after: None,
            at: Utc::now(),
        }
    }

    /// Attach a snapshot of the record before the change
    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    /// Attach a snapshot of the record after the change
    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }
}
