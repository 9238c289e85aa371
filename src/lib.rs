//! School Fee Ledger Library
//!
//! # Overview
//!
//! A per-student double-entry fee ledger for a school: fee invoices,
//! idempotent payments, a credit wallet for overpayments, payment voids,
//! bank statement import and one-to-one reconciliation of statement lines
//! against ledger transactions.
//!
//! # Architecture
//!
//! - [`types`] - Domain types (`Money`, invoices, payments, statements) and `LedgerError`
//! - [`core`] - The [`FeeLedger`] and its components:
//!   - [`core::ledger_account`] - Student accounts and per-student serialization
//!   - [`core::journal`] - Append-only ledger transactions and balance reconstruction
//!   - [`core::engine`] - Journal replay onto a ledger
//!   - [`core::batch_processor`] - Student-partitioned concurrent replay
//! - [`io`] - CSV readers and writers
//! - [`strategy`] - Sequential and parallel replay pipelines
//! - [`cli`] - Command-line arguments
//!
//! # Balances
//!
//! Each student account holds:
//! - `balance`: fees outstanding, the sum of the student's ledger transactions
//! - `credit_balance`: surplus available for future invoices, never negative
//!
//! All amounts are whole minor units; decimal strings are only accepted at
//! the CSV and CLI boundary.

pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{FeeLedger, FeeStructure, MemoryAuditLog, ReplayEngine, TracingAuditSink};
pub use io::write_balances_csv;
pub use types::{ErrorKind, LedgerError, Money, StudentAccount, StudentId};
