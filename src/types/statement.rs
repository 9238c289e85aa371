//! Bank statement and reconciliation types

use super::ids::{BankAccountId, StatementId, StatementLineId, TransactionId, UserId};
use super::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One of the institution's bank accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: BankAccountId,
    pub account_name: String,
    pub bank_name: String,
}

/// Statement lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementStatus {
    Open,
    Reconciled,
}

/// A statement row as it arrived, before validation
///
/// Fields are kept as text so that every problem in a statement can be
/// reported together instead of stopping at the first unparseable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatementLine {
    /// 1-based data row number in the source file
    pub row: usize,
    pub transaction_date: String,
    pub description: String,
    pub debit: String,
    pub credit: String,
}

/// Request to import a statement
#[derive(Debug, Clone)]
pub struct StatementImport {
    pub bank_account: BankAccountId,
    pub statement_date: NaiveDate,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub reference: String,
    pub lines: Vec<RawStatementLine>,
}

/// A validated statement row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLineInput {
    pub transaction_date: NaiveDate,
    pub description: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
}

/// A persisted statement row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankStatementLine {
    pub id: StatementLineId,
    pub statement: StatementId,
    pub transaction_date: NaiveDate,
    pub description: String,
    /// Money leaving the account
    pub debit_amount: Money,
    /// Money entering the account
    pub credit_amount: Money,
    pub is_matched: bool,
}

impl BankStatementLine {
    /// The ledger amount this line pairs with
    ///
    /// Incoming money (a credit line) reduces what a student owes, so it pairs
    /// with a negative ledger amount; outgoing money pairs with a positive one.
    pub fn expected_ledger_amount(&self) -> Option<Money> {
        self.debit_amount.checked_sub(self.credit_amount)
    }
}

/// An imported bank statement with all of its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankStatement {
    pub id: StatementId,
    pub bank_account: BankAccountId,
    pub statement_date: NaiveDate,
    pub opening_balance: Money,
    pub closing_balance: Money,
    pub reference: String,
    pub status: StatementStatus,
    pub lines: Vec<BankStatementLine>,
    pub imported_by: UserId,
    pub imported_at: DateTime<Utc>,
}

impl BankStatement {
    /// Closing balance implied by the opening balance and the lines
    pub fn computed_closing(&self) -> Option<Money> {
        self.lines.iter().try_fold(self.opening_balance, |acc, line| {
            acc.checked_add(line.credit_amount)?
                .checked_sub(line.debit_amount)
        })
    }

    pub fn line(&self, line: StatementLineId) -> Option<&BankStatementLine> {
        self.lines.iter().find(|l| l.id == line)
    }
}

/// A confirmed pairing of a statement line with a ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchLink {
    pub statement_line: StatementLineId,
    pub ledger_transaction: TransactionId,
    pub matched_by: UserId,
    pub matched_at: DateTime<Utc>,
}

/// Matching progress for one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub statement: StatementId,
    pub status: StatementStatus,
    pub total_lines: usize,
    pub matched_lines: usize,
    pub unmatched_credits: Money,
    pub unmatched_debits: Money,
}

impl ReconciliationSummary {
    pub fn is_fully_matched(&self) -> bool {
        self.matched_lines == self.total_lines
    }
}
