//! Credit wallet: consuming surplus payments against invoices
//!
//! Credit is created only by payment surpluses. Applying it posts a
//! `CreditApplication` transaction of `-amount`, which lowers both the credit
//! balance and the outstanding balance.

use crate::core::ledger::FeeLedger;
use crate::types::{
    AuditAction, AuditEntry, CreditApplication, Invoice, InvoiceId, LedgerError, Money, Posting,
    StudentAccount, StudentId, TransactionKind, UserId,
};
use tracing::info;

impl FeeLedger {
    /// Apply `amount` of a student's credit to one of their invoices
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount or one above the invoice balance
    /// - `NotFound` for an unknown student or invoice
    /// - `NoPendingInvoice` if the invoice belongs to another student or has
    ///   nothing outstanding
    /// - `InsufficientCredit` if the amount exceeds the credit balance
    pub fn pay_with_credit(
        &self,
        student: StudentId,
        invoice: InvoiceId,
        amount: Money,
        actor: UserId,
    ) -> Result<CreditApplication, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::validation(format!(
                "credit amount must be positive, got {}",
                amount
            )));
        }

        let application = self.accounts.with_account(student, |account| {
            let target = self
                .invoice(invoice)
                .ok_or_else(|| LedgerError::not_found("invoice", invoice))?;
            if target.student != student || !target.is_pending() {
                return Err(LedgerError::no_pending_invoice(student, Some(invoice)));
            }
            if amount > account.credit_balance {
                return Err(LedgerError::insufficient_credit(
                    student,
                    account.credit_balance,
                    amount,
                ));
            }
            if amount > target.balance {
                return Err(LedgerError::validation(format!(
                    "credit amount {} exceeds invoice balance {}",
                    amount, target.balance
                )));
            }
            self.apply_credit_locked(account, target, amount, actor)
        })?;

        self.audit_credit(student, &application, actor);
        Ok(application)
    }

    /// Apply available credit to pending invoices, oldest first
    ///
    /// At most `limit` is applied when given. Returns the applications made;
    /// the list is empty when the student has no credit.
    ///
    /// # Errors
    ///
    /// `NoPendingInvoice` when credit is available but nothing is pending.
    pub fn apply_credit_to_pending(
        &self,
        student: StudentId,
        limit: Option<Money>,
        actor: UserId,
    ) -> Result<Vec<CreditApplication>, LedgerError> {
        if let Some(limit) = limit {
            if limit.is_negative() {
                return Err(LedgerError::validation(format!(
                    "credit limit must not be negative, got {}",
                    limit
                )));
            }
        }

        let applications = self.accounts.with_account(student, |account| {
            let mut available = match limit {
                Some(limit) => limit.min(account.credit_balance),
                None => account.credit_balance,
            };
            if available.is_zero() {
                return Ok(Vec::new());
            }

            let pending = self.pending_invoices(student);
            if pending.is_empty() {
                return Err(LedgerError::no_pending_invoice(student, None));
            }

            let mut applications = Vec::new();
            for invoice in pending {
                if available.is_zero() {
                    break;
                }
                let portion = available.min(invoice.balance);
                applications.push(self.apply_credit_locked(account, invoice, portion, actor)?);
                available = available
                    .checked_sub(portion)
                    .ok_or_else(|| LedgerError::arithmetic_underflow("credit application", student))?;
            }
            Ok(applications)
        })?;

        for application in &applications {
            self.audit_credit(student, application, actor);
        }
        Ok(applications)
    }

    /// Post one credit application; all checks have already passed
    fn apply_credit_locked(
        &self,
        account: &mut StudentAccount,
        mut invoice: Invoice,
        amount: Money,
        actor: UserId,
    ) -> Result<CreditApplication, LedgerError> {
        let debit = amount
            .checked_neg()
            .ok_or_else(|| LedgerError::arithmetic_overflow("credit application", account.student))?;
        invoice.settle(amount)?;

        let transactions = self.post(
            account,
            vec![Posting {
                kind: TransactionKind::CreditApplication,
                amount: debit,
                reference: invoice.id,
                bank_account: None,
                description: format!("Credit applied to {}", invoice.invoice_number),
            }],
            actor,
        )?;
        let transaction = transactions.first().map(|t| t.id).ok_or_else(|| {
            LedgerError::invalid_state("invoice", invoice.id, "apply credit to", "no ledger transaction was posted")
        })?;

        let application = CreditApplication {
            invoice: invoice.id,
            amount,
            transaction,
            invoice_balance: invoice.balance,
            new_balance: account.balance,
            credit_balance: account.credit_balance,
        };
        self.invoices.insert(invoice.id, invoice);
        Ok(application)
    }

    fn audit_credit(&self, student: StudentId, application: &CreditApplication, actor: UserId) {
        if let Some(invoice) = self.invoice(application.invoice) {
            self.record_audit(
                AuditEntry::new(actor, AuditAction::Update, "invoices", invoice.id).after(&invoice),
            );
        }
        info!(
            student,
            invoice = application.invoice,
            amount = %application.amount,
            credit_balance = %application.credit_balance,
            "credit applied"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{invoice, ledger, payment, register};
    use crate::types::{ErrorKind, InvoiceStatus, StudentType};
    use rstest::rstest;

    /// Student 1 with 2500 credit and a fresh 10000 invoice for term 2
    fn ledger_with_credit() -> (FeeLedger, Invoice) {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);
        ledger.record_payment(payment(1, 12_500, "k1")).unwrap();
        let open = invoice(&ledger, 1, 2, 10_000);
        (ledger, open)
    }

    #[test]
    fn test_pay_with_credit() {
        let (ledger, open) = ledger_with_credit();

        let application = ledger
            .pay_with_credit(1, open.id, Money::from_minor(2_000), 1)
            .unwrap();

        assert_eq!(application.invoice_balance, Money::from_minor(8_000));
        assert_eq!(application.new_balance, Money::from_minor(8_000));
        assert_eq!(application.credit_balance, Money::from_minor(500));

        let transaction = ledger.transaction(application.transaction).unwrap();
        assert_eq!(transaction.kind, TransactionKind::CreditApplication);
        assert_eq!(transaction.amount, Money::from_minor(-2_000));
    }

    #[rstest]
    #[case::zero(2, 0, ErrorKind::Validation)]
    #[case::above_credit(2, 3_000, ErrorKind::InsufficientCredit)]
    #[case::settled_invoice(1, 100, ErrorKind::NoPendingInvoice)]
    #[case::unknown_invoice(99, 100, ErrorKind::NotFound)]
    fn test_pay_with_credit_errors(
        #[case] invoice_id: InvoiceId,
        #[case] minor: i64,
        #[case] expected: ErrorKind,
    ) {
        let (ledger, _) = ledger_with_credit();

        let result = ledger.pay_with_credit(1, invoice_id, Money::from_minor(minor), 1);

        assert_eq!(result.unwrap_err().kind(), expected);
        assert_eq!(
            ledger.account(1).unwrap().credit_balance,
            Money::from_minor(2_500)
        );
    }

    #[test]
    fn test_pay_with_credit_above_invoice_balance() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        ledger.record_payment(payment(1, 5_000, "advance")).unwrap();
        let small = invoice(&ledger, 1, 1, 1_000);

        let result = ledger.pay_with_credit(1, small.id, Money::from_minor(2_000), 1);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_pay_with_credit_other_students_invoice() {
        let (ledger, _) = ledger_with_credit();
        register(&ledger, 2, "Form 1", StudentType::Day);
        let foreign = invoice(&ledger, 2, 1, 10_000);

        let result = ledger.pay_with_credit(1, foreign.id, Money::from_minor(100), 1);

        assert_eq!(
            result,
            Err(LedgerError::no_pending_invoice(1, Some(foreign.id)))
        );
    }

    #[test]
    fn test_apply_credit_to_pending_oldest_first() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        ledger.record_payment(payment(1, 5_000, "advance")).unwrap();
        let first = invoice(&ledger, 1, 1, 3_000);
        let second = invoice(&ledger, 1, 2, 3_000);

        let applications = ledger.apply_credit_to_pending(1, None, 1).unwrap();

        assert_eq!(applications.len(), 2);
        assert_eq!(ledger.invoice(first.id).unwrap().status, InvoiceStatus::Paid);
        assert_eq!(ledger.invoice(second.id).unwrap().balance, Money::from_minor(1_000));
        let account = ledger.account(1).unwrap();
        assert_eq!(account.credit_balance, Money::ZERO);
        assert_eq!(account.balance, Money::from_minor(1_000));
    }

    #[test]
    fn test_apply_credit_to_pending_respects_limit() {
        let (ledger, open) = ledger_with_credit();

        let applications = ledger
            .apply_credit_to_pending(1, Some(Money::from_minor(1_000)), 1)
            .unwrap();

        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].invoice, open.id);
        assert_eq!(
            ledger.account(1).unwrap().credit_balance,
            Money::from_minor(1_500)
        );
    }

    #[test]
    fn test_apply_credit_without_credit_is_noop() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 3_000);

        assert!(ledger.apply_credit_to_pending(1, None, 1).unwrap().is_empty());
    }

    #[test]
    fn test_apply_credit_without_pending_invoice() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        ledger.record_payment(payment(1, 5_000, "advance")).unwrap();

        let result = ledger.apply_credit_to_pending(1, None, 1);

        assert_eq!(result, Err(LedgerError::no_pending_invoice(1, None)));
    }
}
