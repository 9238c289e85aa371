//! Append-only ledger transaction log
//!
//! Every balance change is appended here as a `LedgerTransaction`. Entries
//! are never removed or edited, except for the `matched` flag set once by
//! reconciliation.

use crate::types::{
    BankAccountId, LedgerError, LedgerTransaction, Money, Posting, StudentId, TransactionId,
    UserId,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe journal of ledger transactions
#[derive(Debug)]
pub struct Journal {
    entries: DashMap<TransactionId, LedgerTransaction>,
    /// Transaction ids per student, in append order
    by_student: DashMap<StudentId, Vec<TransactionId>>,
    next_id: AtomicU64,
}

impl Journal {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_student: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a posting for `student` and return the stored transaction
    pub fn append(&self, student: StudentId, posting: Posting, actor: UserId) -> LedgerTransaction {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let transaction = LedgerTransaction {
            id,
            student,
            amount: posting.amount,
            kind: posting.kind,
            reference: posting.reference,
            bank_account: posting.bank_account,
            description: posting.description,
            created_by: actor,
            created_at: Utc::now(),
            matched: false,
        };
        self.entries.insert(id, transaction.clone());
        self.by_student.entry(student).or_default().push(id);
        transaction
    }

    pub fn get(&self, id: TransactionId) -> Option<LedgerTransaction> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// Run `f` while holding the transaction's entry
    pub fn with_entry<T, F>(&self, id: TransactionId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerTransaction) -> Result<T, LedgerError>,
    {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("transaction", id))?;
        f(entry.value_mut())
    }

    /// Every transaction of one student in posting order
    pub fn for_student(&self, student: StudentId) -> Vec<LedgerTransaction> {
        let ids = match self.by_student.get(&student) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        let mut transactions: Vec<LedgerTransaction> =
            ids.iter().filter_map(|id| self.get(*id)).collect();
        transactions.sort_by_key(|transaction| transaction.id);
        transactions
    }

    /// Unmatched cash movements that could belong to `bank_account`
    ///
    /// Transactions posted without a bank account are included, since they
    /// can be matched against any statement.
    pub fn unmatched_cash(&self, bank_account: BankAccountId) -> Vec<LedgerTransaction> {
        let mut transactions: Vec<LedgerTransaction> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.kind.is_cash_movement()
                    && !entry.matched
                    && entry.bank_account.map_or(true, |account| account == bank_account)
            })
            .map(|entry| entry.value().clone())
            .collect();
        transactions.sort_by_key(|transaction| transaction.id);
        transactions
    }

    /// Balance and credit balance rebuilt from the student's transactions
    pub fn reconstruct(&self, student: StudentId) -> Result<(Money, Money), LedgerError> {
        let transactions = self.for_student(student);

        let balance = Money::checked_sum(transactions.iter().map(|t| t.amount))
            .ok_or_else(|| LedgerError::arithmetic_overflow("balance reconstruction", student))?;
        let credit = Money::checked_sum(
            transactions
                .iter()
                .filter(|t| t.kind.affects_credit())
                .map(|t| t.amount),
        )
        .ok_or_else(|| LedgerError::arithmetic_overflow("credit reconstruction", student))?;

        Ok((balance, credit))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}
