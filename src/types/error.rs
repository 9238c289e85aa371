//! Error types for the fee ledger
//!
//! Every operation fails with a `LedgerError`. Each variant renders a
//! human-readable message through `Display` and maps to a coarse
//! [`ErrorKind`] the calling layer can branch on.
//!
//! # Error Categories
//!
//! - **Input errors**: validation failures (with every issue found), unknown ids
//! - **Ledger rule errors**: idempotency conflicts, duplicate invoices,
//!   insufficient credit, missing pending invoice, invalid state transitions
//! - **Reconciliation errors**: already matched, amount mismatch, account mismatch
//! - **Arithmetic errors**: overflow or underflow in balance calculations
//! - **File errors**: I/O and CSV parsing failures

use super::ids::{BankAccountId, InvoiceId, StatementLineId, StudentId, TransactionId};
use super::money::Money;
use std::fmt;
use thiserror::Error;

/// Machine-checkable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    InsufficientCredit,
    NoPendingInvoice,
    InvalidState,
    AmountMismatch,
    AccountMismatch,
    NotFound,
    Io,
}

/// One problem found while validating input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 1-based data row, when the input is tabular
    pub row: Option<usize>,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationIssue {
            row: None,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn at_row(row: usize, field: &str, message: impl Into<String>) -> Self {
        ValidationIssue {
            row: Some(row),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}, {}: {}", row, self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = issues.iter().map(ToString::to_string).collect();
    format!(" ({})", joined.join("; "))
}

/// Main error type for the fee ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Input is malformed or out of range; nothing was persisted
    #[error("Validation failed: {message}{}", format_issues(issues))]
    Validation {
        message: String,
        /// Every problem found, for a complete error report
        issues: Vec<ValidationIssue>,
    },

    /// An idempotency key was reused with a different payload
    ///
    /// Signals corrupted or mismatched retries; the original payment is
    /// never overwritten.
    #[error("Idempotency key '{key}' for student {student} already used: {message}")]
    IdempotencyConflict {
        student: StudentId,
        key: String,
        message: String,
    },

    /// The student already holds a live invoice for the term
    #[error("Student {student} already has invoice {existing} for year {academic_year} term {term}")]
    DuplicateInvoice {
        student: StudentId,
        academic_year: u32,
        term: u32,
        existing: InvoiceId,
    },

    /// Credit application exceeds the available credit balance
    #[error("Insufficient credit for student {student}: available {available}, requested {requested}")]
    InsufficientCredit {
        student: StudentId,
        available: Money,
        requested: Money,
    },

    /// No open invoice with an outstanding balance to apply funds to
    #[error("No pending invoice for student {student}{}", invoice.map(|i| format!(" (invoice {} is not pending)", i)).unwrap_or_default())]
    NoPendingInvoice {
        student: StudentId,
        invoice: Option<InvoiceId>,
    },

    /// The entity is not in a state that allows the operation
    #[error("Cannot {operation} {entity} {id}: {reason}")]
    InvalidState {
        entity: String,
        id: u64,
        operation: String,
        reason: String,
    },

    /// A statement line or ledger transaction was already reconciled
    #[error("{entity} {id} is already matched")]
    AlreadyMatched { entity: String, id: u64 },

    /// Statement line and ledger transaction amounts do not pair up
    #[error("Amount mismatch: statement line {line} pairs with ledger amount {expected}, transaction {transaction} has {actual}")]
    AmountMismatch {
        line: StatementLineId,
        transaction: TransactionId,
        expected: Money,
        actual: Money,
    },

    /// The transaction was posted to a different bank account than the statement
    #[error("Account mismatch: transaction {transaction} was posted to bank account {transaction_account}, statement is for bank account {statement_account}")]
    AccountMismatch {
        transaction: TransactionId,
        transaction_account: BankAccountId,
        statement_account: BankAccountId,
    },

    /// Unknown student, invoice, payment, statement, line or transaction id
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: u64 },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for student {student}")]
    ArithmeticOverflow {
        operation: String,
        student: StudentId,
    },

    /// A balance would go negative
    #[error("Arithmetic underflow in {operation} for student {student}")]
    ArithmeticUnderflow {
        operation: String,
        student: StudentId,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// CSV structure could not be read
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// The failure category callers branch on
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. }
            | LedgerError::ArithmeticOverflow { .. }
            | LedgerError::ArithmeticUnderflow { .. }
            | LedgerError::ParseError { .. } => ErrorKind::Validation,
            LedgerError::IdempotencyConflict { .. } | LedgerError::DuplicateInvoice { .. } => {
                ErrorKind::Conflict
            }
            LedgerError::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            LedgerError::NoPendingInvoice { .. } => ErrorKind::NoPendingInvoice,
            LedgerError::InvalidState { .. } | LedgerError::AlreadyMatched { .. } => {
                ErrorKind::InvalidState
            }
            LedgerError::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            LedgerError::AccountMismatch { .. } => ErrorKind::AccountMismatch,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Validation issues carried by this error, if any
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            LedgerError::Validation { issues, .. } => issues,
            _ => &[],
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create a Validation error without itemised issues
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Create a Validation error carrying every issue found
    pub fn validation_issues(message: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        LedgerError::Validation {
            message: message.into(),
            issues,
        }
    }

    /// Create an IdempotencyConflict error
    pub fn idempotency_conflict(student: StudentId, key: &str, message: impl Into<String>) -> Self {
        LedgerError::IdempotencyConflict {
            student,
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Create a DuplicateInvoice error
    pub fn duplicate_invoice(
        student: StudentId,
        academic_year: u32,
        term: u32,
        existing: InvoiceId,
    ) -> Self {
        LedgerError::DuplicateInvoice {
            student,
            academic_year,
            term,
            existing,
        }
    }

    /// Create an InsufficientCredit error
    pub fn insufficient_credit(student: StudentId, available: Money, requested: Money) -> Self {
        LedgerError::InsufficientCredit {
            student,
            available,
            requested,
        }
    }

    /// Create a NoPendingInvoice error
    pub fn no_pending_invoice(student: StudentId, invoice: Option<InvoiceId>) -> Self {
        LedgerError::NoPendingInvoice { student, invoice }
    }

    /// Create an InvalidState error
    pub fn invalid_state(entity: &str, id: u64, operation: &str, reason: impl Into<String>) -> Self {
        LedgerError::InvalidState {
            entity: entity.to_string(),
            id,
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an AlreadyMatched error
    pub fn already_matched(entity: &str, id: u64) -> Self {
        LedgerError::AlreadyMatched {
            entity: entity.to_string(),
            id,
        }
    }

    /// Create an AmountMismatch error
    pub fn amount_mismatch(
        line: StatementLineId,
        transaction: TransactionId,
        expected: Money,
        actual: Money,
    ) -> Self {
        LedgerError::AmountMismatch {
            line,
            transaction,
            expected,
            actual,
        }
    }

    /// Create an AccountMismatch error
    pub fn account_mismatch(
        transaction: TransactionId,
        transaction_account: BankAccountId,
        statement_account: BankAccountId,
    ) -> Self {
        LedgerError::AccountMismatch {
            transaction,
            transaction_account,
            statement_account,
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: &str, id: u64) -> Self {
        LedgerError::NotFound {
            entity: entity.to_string(),
            id,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, student: StudentId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            student,
        }
    }

    /// Create an ArithmeticUnderflow error
    pub fn arithmetic_underflow(operation: &str, student: StudentId) -> Self {
        LedgerError::ArithmeticUnderflow {
            operation: operation.to_string(),
            student,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::validation_plain(
        LedgerError::validation("amount must be positive"),
        "Validation failed: amount must be positive"
    )]
    #[case::validation_with_issues(
        LedgerError::validation_issues(
            "statement has invalid lines",
            vec![
                ValidationIssue::at_row(2, "date", "'31/02/2024' is not a valid date"),
                ValidationIssue::new("lines", "statement has no lines"),
            ],
        ),
        "Validation failed: statement has invalid lines (row 2, date: '31/02/2024' is not a valid date; lines: statement has no lines)"
    )]
    #[case::idempotency_conflict(
        LedgerError::idempotency_conflict(3, "k1", "amount 40.00 differs from original 50.00"),
        "Idempotency key 'k1' for student 3 already used: amount 40.00 differs from original 50.00"
    )]
    #[case::duplicate_invoice(
        LedgerError::duplicate_invoice(3, 2024, 1, 9),
        "Student 3 already has invoice 9 for year 2024 term 1"
    )]
    #[case::insufficient_credit(
        LedgerError::insufficient_credit(1, Money::from_minor(500), Money::from_minor(1000)),
        "Insufficient credit for student 1: available 5.00, requested 10.00"
    )]
    #[case::no_pending_invoice(
        LedgerError::no_pending_invoice(1, None),
        "No pending invoice for student 1"
    )]
    #[case::no_pending_specific_invoice(
        LedgerError::no_pending_invoice(1, Some(4)),
        "No pending invoice for student 1 (invoice 4 is not pending)"
    )]
    #[case::invalid_state(
        LedgerError::invalid_state("payment", 12, "void", "payment is already voided"),
        "Cannot void payment 12: payment is already voided"
    )]
    #[case::already_matched(
        LedgerError::already_matched("statement line", 5),
        "statement line 5 is already matched"
    )]
    #[case::amount_mismatch(
        LedgerError::amount_mismatch(5, 8, Money::from_minor(-5000), Money::from_minor(-4000)),
        "Amount mismatch: statement line 5 pairs with ledger amount -50.00, transaction 8 has -40.00"
    )]
    #[case::account_mismatch(
        LedgerError::account_mismatch(8, 2, 1),
        "Account mismatch: transaction 8 was posted to bank account 2, statement is for bank account 1"
    )]
    #[case::not_found(LedgerError::not_found("student", 42), "student 42 not found")]
    #[case::parse_error_with_line(
        LedgerError::ParseError { line: Some(4), message: "bad field".to_string() },
        "CSV parse error at line 4: bad field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case(LedgerError::validation("x"), ErrorKind::Validation)]
    #[case(LedgerError::arithmetic_overflow("payment", 1), ErrorKind::Validation)]
    #[case(LedgerError::idempotency_conflict(1, "k", "x"), ErrorKind::Conflict)]
    #[case(LedgerError::duplicate_invoice(1, 1, 1, 1), ErrorKind::Conflict)]
    #[case(LedgerError::insufficient_credit(1, Money::ZERO, Money::from_minor(1)), ErrorKind::InsufficientCredit)]
    #[case(LedgerError::no_pending_invoice(1, None), ErrorKind::NoPendingInvoice)]
    #[case(LedgerError::invalid_state("payment", 1, "void", "x"), ErrorKind::InvalidState)]
    #[case(LedgerError::already_matched("transaction", 1), ErrorKind::InvalidState)]
    #[case(LedgerError::amount_mismatch(1, 1, Money::ZERO, Money::ZERO), ErrorKind::AmountMismatch)]
    #[case(LedgerError::account_mismatch(1, 1, 2), ErrorKind::AccountMismatch)]
    #[case(LedgerError::not_found("invoice", 1), ErrorKind::NotFound)]
    fn test_error_kind(#[case] error: LedgerError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_issues_accessor() {
        let error = LedgerError::validation_issues(
            "bad",
            vec![ValidationIssue::at_row(1, "description", "is empty")],
        );
        assert_eq!(error.issues().len(), 1);
        assert!(LedgerError::not_found("student", 1).issues().is_empty());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
        assert_eq!(error.kind(), ErrorKind::Io);
    }
}
