//! Core ledger module
//!
//! This module contains the fee ledger and the components around it:
//! - `traits` - Seams for the fee schedule and the audit sink
//! - `fee_structure` - In-memory fee schedule loadable from CSV
//! - `audit_log` - Audit sinks (tracing, in-memory)
//! - `ledger_account` - Student accounts and the per-student critical section
//! - `journal` - Append-only ledger transactions
//! - `ledger` - The `FeeLedger` aggregate and its queries
//! - `invoice_manager`, `payment_processor`, `credit_wallet`, `void_engine` -
//!   balance-changing operations
//! - `statement_importer`, `reconciliation` - bank statements and matching
//! - `engine` - Journal replay onto a ledger
//! - `batch_processor` - Student-partitioned concurrent replay

pub mod audit_log;
pub mod batch_processor;
mod credit_wallet;
pub mod engine;
pub mod fee_structure;
mod invoice_manager;
pub mod journal;
pub mod ledger;
pub mod ledger_account;
mod payment_processor;
mod reconciliation;
pub mod statement_importer;
pub mod traits;
mod void_engine;

#[cfg(test)]
pub(crate) mod testing;

pub use audit_log::{MemoryAuditLog, TracingAuditSink};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::ReplayEngine;
pub use fee_structure::FeeStructure;
pub use journal::Journal;
pub use ledger::FeeLedger;
pub use ledger_account::LedgerAccounts;
pub use statement_importer::{parse_statement_date, validate_statement_lines};
pub use traits::{AuditSink, FeeSchedule};
