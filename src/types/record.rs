//! Journal replay records
//!
//! A replay journal is a CSV file of ledger operations. Each row is converted
//! into a `JournalRecord` before it reaches the ledger.

use super::ids::{AcademicYearId, StudentId, TermId};
use super::money::Money;
use super::payment::PaymentMethod;

/// Ledger operation named by a journal row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOp {
    /// Issue an invoice with a single line item
    Invoice {
        academic_year: AcademicYearId,
        term: TermId,
        fee_category: String,
        amount: Money,
    },

    /// Record a payment
    Payment {
        amount: Money,
        idempotency_key: String,
        method: PaymentMethod,
        reference: String,
        term: Option<TermId>,
    },

    /// Apply available credit to pending invoices, up to `limit` if given
    Credit { limit: Option<Money> },

    /// Void the payment recorded under `idempotency_key`
    Void {
        idempotency_key: String,
        reason: String,
    },
}

impl JournalOp {
    /// Lowercase name used in the journal's `type` column
    pub fn name(&self) -> &'static str {
        match self {
            JournalOp::Invoice { .. } => "invoice",
            JournalOp::Payment { .. } => "payment",
            JournalOp::Credit { .. } => "credit",
            JournalOp::Void { .. } => "void",
        }
    }
}

/// One parsed journal row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    pub student: StudentId,
    pub op: JournalOp,
}
