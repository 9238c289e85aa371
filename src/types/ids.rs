//! Identifier types
//!
//! Identifiers for entities owned by the surrounding application (students,
//! users, bank accounts, academic calendar) are supplied by the caller.
//! Identifiers for ledger records are allocated by the ledger from
//! monotonically increasing sequences.

/// Student identifier, assigned by the student directory
pub type StudentId = u32;

/// Acting user identifier, supplied with every mutating call
pub type UserId = u32;

/// Institution bank account identifier
pub type BankAccountId = u32;

/// Academic year identifier
pub type AcademicYearId = u32;

/// Term identifier within an academic year
pub type TermId = u32;

/// Invoice identifier
pub type InvoiceId = u64;

/// Payment identifier
pub type PaymentId = u64;

/// Ledger transaction identifier
pub type TransactionId = u64;

/// Bank statement identifier
pub type StatementId = u64;

/// Bank statement line identifier
pub type StatementLineId = u64;
