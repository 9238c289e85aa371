//! Types module
//!
//! Contains core data structures used throughout the ledger:
//! - `money`: minor-unit amount type
//! - `ids`: identifier aliases
//! - `student`: student accounts and profiles
//! - `invoice`: invoices and fee-structure rows
//! - `payment`: payments, receipts and outcomes
//! - `transaction`: append-only ledger transactions
//! - `statement`: bank statements, lines and match links
//! - `record`: parsed journal rows for replay
//! - `audit`: audit-log entries
//! - `error`: error types for the ledger

pub mod audit;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod payment;
pub mod record;
pub mod statement;
pub mod student;
pub mod transaction;

pub use audit::{AuditAction, AuditEntry};
pub use error::{ErrorKind, LedgerError, ValidationIssue};
pub use ids::{
    AcademicYearId, BankAccountId, InvoiceId, PaymentId, StatementId, StatementLineId, StudentId,
    TermId, TransactionId, UserId,
};
pub use invoice::{
    BatchFailure, BatchInvoiceReport, FeeStructureRow, Invoice, InvoiceLineItem, InvoiceStatus,
    NewInvoice,
};
pub use money::Money;
pub use payment::{
    Allocation, CreditApplication, Payment, PaymentMethod, PaymentRequest, PaymentStatus,
    Receipt, VoidOutcome,
};
pub use record::{JournalOp, JournalRecord};
pub use statement::{
    BankAccount, BankStatement, BankStatementLine, MatchLink, RawStatementLine,
    ReconciliationSummary, StatementImport, StatementLineInput, StatementStatus,
};
pub use student::{StudentAccount, StudentProfile, StudentType};
pub use transaction::{LedgerTransaction, Posting, TransactionKind};
