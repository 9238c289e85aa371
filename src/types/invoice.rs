//! Invoice and fee-structure types

use super::error::LedgerError;
use super::ids::{AcademicYearId, InvoiceId, StudentId, TermId, UserId};
use super::money::Money;
use super::student::StudentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invoice lifecycle
///
/// `Open` invoices with a positive balance are pending. An invoice becomes
/// `Paid` when its balance reaches zero and goes back to `Open` if a payment
/// applied to it is voided. `Void` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Open,
    Paid,
    Void,
}

/// A single charge on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    /// Fee category, e.g. "TUITION" or "BOARDING"
    pub fee_category: String,
    pub amount: Money,
}

/// A fee invoice issued to a student for one academic year and term
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable number printed on statements
    pub invoice_number: String,
    pub student: StudentId,
    pub academic_year: AcademicYearId,
    pub term: TermId,
    pub line_items: Vec<InvoiceLineItem>,
    pub total: Money,
    /// Amount still owed: total minus payments and credit applied
    pub balance: Money,
    pub status: InvoiceStatus,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub void_reason: Option<String>,
}

impl Invoice {
    /// Whether this invoice can still receive payments or credit
    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Open && self.balance.is_positive()
    }

    /// Whether this invoice counts against duplicate invoicing for its term
    pub fn is_live(&self) -> bool {
        self.status != InvoiceStatus::Void
    }

    /// Reduce the balance by `amount`, marking the invoice paid at zero
    pub(crate) fn settle(&mut self, amount: Money) -> Result<(), LedgerError> {
        let balance = self
            .balance
            .checked_sub(amount)
            .filter(|balance| !balance.is_negative())
            .ok_or_else(|| LedgerError::arithmetic_underflow("invoice settlement", self.student))?;
        self.balance = balance;
        if balance.is_zero() {
            self.status = InvoiceStatus::Paid;
        }
        Ok(())
    }

    /// Restore `amount` to the balance after a reversal, reopening the invoice
    pub(crate) fn restore(&mut self, amount: Money) -> Result<(), LedgerError> {
        let balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| *balance <= self.total)
            .ok_or_else(|| LedgerError::arithmetic_overflow("invoice restore", self.student))?;
        self.balance = balance;
        if balance.is_positive() {
            self.status = InvoiceStatus::Open;
        }
        Ok(())
    }
}

/// Request to issue a single invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub student: StudentId,
    pub academic_year: AcademicYearId,
    pub term: TermId,
    pub line_items: Vec<InvoiceLineItem>,
}

/// One row of the institution's fee structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStructureRow {
    pub academic_year: AcademicYearId,
    pub term: TermId,
    pub stream: String,
    pub student_type: StudentType,
    pub fee_category: String,
    pub amount: Money,
}

/// A student the batch run could not invoice
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub student: StudentId,
    pub error: LedgerError,
}

/// Outcome of a batch invoice generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchInvoiceReport {
    /// Number of invoices created
    pub count: usize,
    pub created: Vec<InvoiceId>,
    /// Students skipped because they already hold a live invoice for the term
    pub skipped: Vec<StudentId>,
    pub failures: Vec<BatchFailure>,
}
