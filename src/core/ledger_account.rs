//! Student account state and the per-student critical section
//!
//! `LedgerAccounts` stores every student's account in a `DashMap`. All
//! balance changes for a student happen inside [`LedgerAccounts::with_account`],
//! which holds the account's map entry for the duration of the closure. That
//! entry guard is the student's critical section: two operations for the same
//! student never interleave, while operations for different students proceed
//! in parallel.
//!
//! # Lock Order
//!
//! Code running inside `with_account` may take entries in the invoice,
//! payment, idempotency and journal maps, but must never reach back into the
//! account map.

use crate::types::{LedgerError, Money, Posting, StudentAccount, StudentId, StudentProfile};
use dashmap::DashMap;

/// Concurrent store of student accounts
#[derive(Debug, Default)]
pub struct LedgerAccounts {
    accounts: DashMap<StudentId, StudentAccount>,
}

impl LedgerAccounts {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Register a student, or refresh the profile of a known one
    ///
    /// Balances of an existing account are left untouched.
    pub fn register(&self, profile: StudentProfile) -> StudentAccount {
        let mut entry = self
            .accounts
            .entry(profile.student)
            .or_insert_with(|| StudentAccount::new(profile.clone()));
        let account = entry.value_mut();
        account.stream = profile.stream;
        account.student_type = profile.student_type;
        account.active = profile.active;
        account.clone()
    }

    /// Get an existing account or open a placeholder one
    pub fn ensure(&self, student: StudentId) -> StudentAccount {
        self.accounts
            .entry(student)
            .or_insert_with(|| StudentAccount::new(StudentProfile::placeholder(student)))
            .clone()
    }

    /// Snapshot of one account
    pub fn get(&self, student: StudentId) -> Option<StudentAccount> {
        self.accounts.get(&student).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, student: StudentId) -> bool {
        self.accounts.contains_key(&student)
    }

    /// Run `f` inside the student's critical section
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unregistered student, otherwise whatever
    /// `f` returns.
    pub fn with_account<T, F>(&self, student: StudentId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut StudentAccount) -> Result<T, LedgerError>,
    {
        let mut entry = self
            .accounts
            .get_mut(&student)
            .ok_or_else(|| LedgerError::not_found("student", u64::from(student)))?;
        f(entry.value_mut())
    }

    /// Snapshot of every account, sorted by student id
    pub fn all(&self) -> Vec<StudentAccount> {
        let mut accounts: Vec<StudentAccount> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.student);
        accounts
    }

    /// Snapshot of active accounts, sorted by student id
    pub fn active(&self) -> Vec<StudentAccount> {
        let mut accounts = self.all();
        accounts.retain(|account| account.active);
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Balances an account would have after applying `postings`
///
/// Nothing is mutated. Fails if any sum overflows or either balance would
/// become negative, so callers can validate a whole operation before
/// committing any part of it.
pub fn project(account: &StudentAccount, postings: &[Posting]) -> Result<(Money, Money), LedgerError> {
    let student = account.student;
    let mut balance = account.balance;
    let mut credit = account.credit_balance;

    for posting in postings {
        balance = balance
            .checked_add(posting.amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("balance update", student))?;
        if posting.kind.affects_credit() {
            credit = credit
                .checked_add(posting.amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("credit update", student))?;
        }
    }

    if balance.is_negative() {
        return Err(LedgerError::arithmetic_underflow("balance update", student));
    }
    if credit.is_negative() {
        return Err(LedgerError::arithmetic_underflow("credit update", student));
    }

    Ok((balance, credit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StudentType, TransactionKind};
    use rstest::rstest;
    use std::sync::Arc;
    use std::thread;

    fn posting(kind: TransactionKind, minor: i64) -> Posting {
        Posting {
            kind,
            amount: Money::from_minor(minor),
            reference: 1,
            bank_account: None,
            description: String::new(),
        }
    }

    fn account(balance: i64, credit: i64) -> StudentAccount {
        let mut account = StudentAccount::new(StudentProfile::placeholder(1));
        account.balance = Money::from_minor(balance);
        account.credit_balance = Money::from_minor(credit);
        account
    }

    #[test]
    fn test_register_creates_account_with_zero_balances() {
        let accounts = LedgerAccounts::new();

        let account = accounts.register(StudentProfile {
            student: 1,
            stream: "Form 1".to_string(),
            student_type: StudentType::Boarder,
            active: true,
        });

        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(account.credit_balance, Money::ZERO);
        assert_eq!(account.student_type, StudentType::Boarder);
    }

    #[test]
    fn test_register_existing_keeps_balances() {
        let accounts = LedgerAccounts::new();
        accounts.ensure(1);
        accounts
            .with_account(1, |account| {
                account.balance = Money::from_minor(500);
                Ok(())
            })
            .unwrap();

        let account = accounts.register(StudentProfile {
            student: 1,
            stream: "Form 3".to_string(),
            student_type: StudentType::Day,
            active: false,
        });

        assert_eq!(account.balance, Money::from_minor(500));
        assert_eq!(account.stream, "Form 3");
        assert!(!account.active);
        assert!(accounts.active().is_empty());
    }

    #[test]
    fn test_with_account_unknown_student() {
        let accounts = LedgerAccounts::new();

        let result = accounts.with_account(9, |_| Ok(()));

        assert_eq!(result, Err(LedgerError::not_found("student", 9)));
    }

    #[test]
    fn test_with_account_propagates_closure_error() {
        let accounts = LedgerAccounts::new();
        accounts.ensure(1);

        let result: Result<(), _> =
            accounts.with_account(1, |_| Err(LedgerError::validation("rejected")));

        assert_eq!(result, Err(LedgerError::validation("rejected")));
    }

    #[test]
    fn test_all_is_sorted() {
        let accounts = LedgerAccounts::new();
        for student in [3, 1, 2] {
            accounts.ensure(student);
        }

        let ids: Vec<StudentId> = accounts.all().iter().map(|a| a.student).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[rstest]
    #[case::invoice(0, 0, vec![posting(TransactionKind::Invoice, 1000)], (1000, 0))]
    #[case::overpayment(
        1000,
        0,
        vec![
            posting(TransactionKind::Payment, -1500),
            posting(TransactionKind::CreditDeposit, 500),
        ],
        (0, 500)
    )]
    #[case::credit_application(
        1000,
        500,
        vec![posting(TransactionKind::CreditApplication, -500)],
        (500, 0)
    )]
    fn test_project(
        #[case] balance: i64,
        #[case] credit: i64,
        #[case] postings: Vec<Posting>,
        #[case] expected: (i64, i64),
    ) {
        let (new_balance, new_credit) = project(&account(balance, credit), &postings).unwrap();
        assert_eq!(new_balance, Money::from_minor(expected.0));
        assert_eq!(new_credit, Money::from_minor(expected.1));
    }

    #[rstest]
    #[case::negative_balance(100, 0, vec![posting(TransactionKind::Payment, -200)])]
    #[case::negative_credit(
        100,
        50,
        vec![posting(TransactionKind::CreditReversal, -100)]
    )]
    fn test_project_rejects_negative(
        #[case] balance: i64,
        #[case] credit: i64,
        #[case] postings: Vec<Posting>,
    ) {
        let result = project(&account(balance, credit), &postings);
        assert!(matches!(result, Err(LedgerError::ArithmeticUnderflow { .. })));
    }

    #[test]
    fn test_project_overflow() {
        let result = project(
            &account(i64::MAX, 0),
            &[posting(TransactionKind::Invoice, 1)],
        );
        assert!(matches!(result, Err(LedgerError::ArithmeticOverflow { .. })));
    }

    #[test]
    fn test_concurrent_updates_same_account() {
        let accounts = Arc::new(LedgerAccounts::new());
        accounts.ensure(1);
        let mut handles = vec![];

        for _ in 0..100 {
            let accounts = Arc::clone(&accounts);
            handles.push(thread::spawn(move || {
                accounts
                    .with_account(1, |account| {
                        account.balance = account
                            .balance
                            .checked_add(Money::from_minor(100))
                            .ok_or_else(|| LedgerError::arithmetic_overflow("test", 1))?;
                        Ok(())
                    })
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(accounts.get(1).unwrap().balance, Money::from_minor(10_000));
    }

    #[test]
    fn test_concurrent_ensure_creates_one_account() {
        let accounts = Arc::new(LedgerAccounts::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let accounts = Arc::clone(&accounts);
            handles.push(thread::spawn(move || accounts.ensure(7)));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(accounts.len(), 1);
    }
}
