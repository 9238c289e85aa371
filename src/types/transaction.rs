//! Ledger transaction types
//!
//! Every balance-affecting event is recorded as an append-only
//! `LedgerTransaction` carrying a signed amount. A student's balance is the
//! sum of all their transaction amounts; their credit balance is the sum of
//! the amounts of the credit kinds.

use super::ids::{BankAccountId, StudentId, TransactionId, UserId};
use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Invoice issued: `+total`
    Invoice,

    /// Invoice voided: `-balance`
    InvoiceVoid,

    /// Payment received: `-amount`
    Payment,

    /// Payment reversed: `+amount`
    PaymentVoid,

    /// Payment surplus moved to the credit wallet: `+surplus`
    ///
    /// Offsets the part of the payment that exceeded the outstanding balance,
    /// so the balance never drops below zero.
    CreditDeposit,

    /// Credit consumed against an invoice: `-amount`
    CreditApplication,

    /// Credit withdrawn when the payment that created it is voided: `-surplus`
    CreditReversal,
}

impl TransactionKind {
    /// Whether this kind moves the student's credit balance by its amount
    pub fn affects_credit(self) -> bool {
        matches!(
            self,
            TransactionKind::CreditDeposit
                | TransactionKind::CreditApplication
                | TransactionKind::CreditReversal
        )
    }

    /// Whether this kind corresponds to money moving through a bank account
    ///
    /// Only these transactions can be reconciled against statement lines.
    pub fn is_cash_movement(self) -> bool {
        matches!(self, TransactionKind::Payment | TransactionKind::PaymentVoid)
    }
}

/// A transaction waiting to be appended to the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub kind: TransactionKind,
    /// Signed change to the outstanding balance
    pub amount: Money,
    /// Id of the invoice or payment this posting belongs to
    pub reference: u64,
    pub bank_account: Option<BankAccountId>,
    pub description: String,
}

/// Append-only record of a balance-affecting event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub student: StudentId,
    pub amount: Money,
    pub kind: TransactionKind,
    pub reference: u64,
    pub bank_account: Option<BankAccountId>,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,

    /// Set once when the transaction is reconciled against a statement line
    pub matched: bool,
}

impl LedgerTransaction {
    /// Human-readable reference printed on receipts
    pub fn transaction_ref(&self) -> String {
        format!("TXN-{:08}", self.id)
    }
}
