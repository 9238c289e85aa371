//! Idempotent payment recording
//!
//! A payment reduces the student's balance by its amount and is allocated
//! against pending invoices: the invoice for the requested term first, then
//! the remaining pending invoices oldest first. Whatever exceeds the
//! outstanding balance is moved into the credit wallet with a
//! `CreditDeposit` posting, so the balance never goes negative.

use crate::core::ledger::FeeLedger;
use crate::types::{
    Allocation, AuditAction, AuditEntry, Invoice, LedgerError, Money, Payment, PaymentRequest,
    PaymentStatus, Posting, Receipt, StudentAccount, StudentId, TermId, TransactionKind,
};
use chrono::Utc;
use tracing::{debug, info};

enum PaymentOutcome {
    Recorded(Box<Payment>),
    Replayed(Receipt),
}

fn validate_payment(request: &PaymentRequest) -> Result<(), LedgerError> {
    if !request.amount.is_positive() {
        return Err(LedgerError::validation(format!(
            "payment amount must be positive, got {}",
            request.amount
        )));
    }
    if request.idempotency_key.trim().is_empty() {
        return Err(LedgerError::validation("idempotency key is required"));
    }
    Ok(())
}

impl FeeLedger {
    /// Record a payment and return its receipt
    ///
    /// Retrying with the same idempotency key, amount and method returns the
    /// original receipt without posting anything.
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount or blank idempotency key
    /// - `NotFound` for an unregistered student
    /// - `IdempotencyConflict` when the key was used with a different amount
    ///   or method
    /// - `InvalidState` when the key belongs to a voided payment
    pub fn record_payment(&self, request: PaymentRequest) -> Result<Receipt, LedgerError> {
        validate_payment(&request)?;
        let key = request.idempotency_key.trim().to_string();

        let outcome = self.accounts.with_account(request.student, |account| {
            if let Some(receipt) = self.idempotent_replay(&request, &key)? {
                return Ok(PaymentOutcome::Replayed(receipt));
            }
            self.post_payment_locked(account, &request, key.clone())
                .map(|payment| PaymentOutcome::Recorded(Box::new(payment)))
        })?;

        match outcome {
            PaymentOutcome::Replayed(receipt) => {
                debug!(
                    student = request.student,
                    key = %key,
                    receipt = %receipt.receipt_number,
                    "idempotent payment replay"
                );
                Ok(receipt)
            }
            PaymentOutcome::Recorded(payment) => {
                self.record_audit(
                    AuditEntry::new(request.actor, AuditAction::Create, "payments", payment.id)
                        .after(payment.as_ref()),
                );
                info!(
                    student = payment.student,
                    receipt = %payment.receipt_number,
                    amount = %payment.amount,
                    surplus = %payment.surplus,
                    method = %payment.method,
                    "payment recorded"
                );
                Ok(payment.receipt)
            }
        }
    }

    /// Receipt of an earlier payment with the same key, if this is a retry
    fn idempotent_replay(
        &self,
        request: &PaymentRequest,
        key: &str,
    ) -> Result<Option<Receipt>, LedgerError> {
        let existing = match self.idempotency.get(&(request.student, key.to_string())) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let payment = self
            .payment(existing)
            .ok_or_else(|| LedgerError::not_found("payment", existing))?;

        if payment.status == PaymentStatus::Voided {
            return Err(LedgerError::invalid_state(
                "payment",
                existing,
                "record",
                format!("idempotency key '{}' belongs to a voided payment", key),
            ));
        }
        if payment.amount != request.amount || payment.method != request.method {
            return Err(LedgerError::idempotency_conflict(
                request.student,
                key,
                format!(
                    "original payment was {} by {}, retry is {} by {}",
                    payment.amount, payment.method, request.amount, request.method
                ),
            ));
        }

        Ok(Some(payment.receipt))
    }

    /// Split `amount` across pending invoices without touching the store
    ///
    /// Returns the updated invoice copies and the allocations made.
    fn allocate(
        &self,
        student: StudentId,
        amount: Money,
        term: Option<TermId>,
    ) -> Result<(Vec<Invoice>, Vec<Allocation>), LedgerError> {
        let mut pending = self.pending_invoices(student);
        if let Some(term) = term {
            pending.sort_by_key(|invoice| (invoice.term != term, invoice.id));
        }

        let mut remaining = amount;
        let mut settled = Vec::new();
        let mut allocations = Vec::new();

        for mut invoice in pending {
            if remaining.is_zero() {
                break;
            }
            let portion = remaining.min(invoice.balance);
            invoice.settle(portion)?;
            remaining = remaining
                .checked_sub(portion)
                .ok_or_else(|| LedgerError::arithmetic_underflow("payment allocation", student))?;
            allocations.push(Allocation {
                invoice: invoice.id,
                amount: portion,
            });
            settled.push(invoice);
        }

        Ok((settled, allocations))
    }

    fn post_payment_locked(
        &self,
        account: &mut StudentAccount,
        request: &PaymentRequest,
        key: String,
    ) -> Result<Payment, LedgerError> {
        let student = account.student;
        let (settled, allocations) = self.allocate(student, request.amount, request.term)?;

        let allocated = Money::checked_sum(allocations.iter().map(|a| a.amount))
            .ok_or_else(|| LedgerError::arithmetic_overflow("payment allocation", student))?;
        let surplus = request
            .amount
            .checked_sub(allocated)
            .ok_or_else(|| LedgerError::arithmetic_underflow("payment surplus", student))?;
        let debit = request
            .amount
            .checked_neg()
            .ok_or_else(|| LedgerError::arithmetic_overflow("payment", student))?;

        let id = self.sequences.next_payment();
        let receipt_number = format!("RCPT-{:06}", id);

        let mut postings = vec![Posting {
            kind: TransactionKind::Payment,
            amount: debit,
            reference: id,
            bank_account: request.bank_account,
            description: request
                .description
                .clone()
                .unwrap_or_else(|| format!("{} {} {}", receipt_number, request.method, request.reference)),
        }];
        if surplus.is_positive() {
            postings.push(Posting {
                kind: TransactionKind::CreditDeposit,
                amount: surplus,
                reference: id,
                bank_account: None,
                description: format!("Surplus from {}", receipt_number),
            });
        }

        let transactions = self.post(account, postings, request.actor)?;
        let transaction = transactions.first().ok_or_else(|| {
            LedgerError::invalid_state("payment", id, "record", "no ledger transaction was posted")
        })?;

        for invoice in settled {
            self.invoices.insert(invoice.id, invoice);
        }

        let now = Utc::now();
        let payment = Payment {
            id,
            student,
            amount: request.amount,
            method: request.method,
            reference: request.reference.clone(),
            receipt_number: receipt_number.clone(),
            idempotency_key: key.clone(),
            description: request.description.clone(),
            term: request.term,
            bank_account: request.bank_account,
            status: PaymentStatus::Posted,
            allocations,
            surplus,
            transaction: transaction.id,
            receipt: Receipt {
                receipt_number,
                payment: id,
                transaction_ref: transaction.transaction_ref(),
                amount: request.amount,
                new_balance: account.balance,
                credit_balance: account.credit_balance,
                issued_at: now,
            },
            created_by: request.actor,
            created_at: now,
            voided_by: None,
            voided_at: None,
            void_reason: None,
        };

        self.payments.insert(id, payment.clone());
        self.idempotency.insert((student, key), id);
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{invoice, ledger, ledger_with_log, payment, register, YEAR};
    use crate::types::{ErrorKind, InvoiceStatus, PaymentMethod, StudentType};
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_partial_payment_reduces_balance() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        let issued = invoice(&ledger, 1, 1, 10_000);

        let receipt = ledger.record_payment(payment(1, 4_000, "k1")).unwrap();

        assert_eq!(receipt.amount, Money::from_minor(4_000));
        assert_eq!(receipt.new_balance, Money::from_minor(6_000));
        assert_eq!(receipt.credit_balance, Money::ZERO);
        assert!(receipt.receipt_number.starts_with("RCPT-"));
        assert!(receipt.transaction_ref.starts_with("TXN-"));

        let updated = ledger.invoice(issued.id).unwrap();
        assert_eq!(updated.balance, Money::from_minor(6_000));
        assert_eq!(updated.status, InvoiceStatus::Open);
    }

    #[test]
    fn test_retry_returns_original_receipt() {
        let (ledger, log) = ledger_with_log();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);

        let first = ledger.record_payment(payment(1, 4_000, "k1")).unwrap();
        let audited = log.len();
        let second = ledger.record_payment(payment(1, 4_000, " k1 ")).unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.account(1).unwrap().balance, Money::from_minor(6_000));
        assert_eq!(ledger.transactions_for(1).len(), 2);
        assert_eq!(log.len(), audited);
    }

    #[rstest]
    #[case::different_amount(3_000, PaymentMethod::Cash)]
    #[case::different_method(4_000, PaymentMethod::Mpesa)]
    fn test_key_reuse_with_different_payload_conflicts(
        #[case] minor: i64,
        #[case] method: PaymentMethod,
    ) {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);
        ledger.record_payment(payment(1, 4_000, "k1")).unwrap();

        let mut retry = payment(1, minor, "k1");
        retry.method = method;
        let result = ledger.record_payment(retry);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(ledger.account(1).unwrap().balance, Money::from_minor(6_000));
    }

    #[test]
    fn test_keys_are_scoped_per_student() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        register(&ledger, 2, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);
        invoice(&ledger, 2, 1, 10_000);

        ledger.record_payment(payment(1, 4_000, "shared")).unwrap();
        ledger.record_payment(payment(2, 1_000, "shared")).unwrap();

        assert_eq!(ledger.account(2).unwrap().balance, Money::from_minor(9_000));
    }

    #[test]
    fn test_retry_of_voided_payment_is_invalid_state() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);
        let receipt = ledger.record_payment(payment(1, 4_000, "k1")).unwrap();
        ledger.void_payment(receipt.payment, "bounced", 1).unwrap();

        let result = ledger.record_payment(payment(1, 4_000, "k1"));

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[rstest]
    #[case::zero_amount(0, "k1")]
    #[case::negative_amount(-100, "k1")]
    #[case::blank_key(100, "   ")]
    fn test_payment_validation(#[case] minor: i64, #[case] key: &str) {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);

        let result = ledger.record_payment(payment(1, minor, key));

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        assert!(ledger.transactions_for(1).is_empty());
    }

    #[test]
    fn test_payment_unknown_student() {
        let ledger = ledger();
        assert_eq!(
            ledger.record_payment(payment(8, 100, "k")),
            Err(LedgerError::not_found("student", 8))
        );
    }

    #[test]
    fn test_overpayment_moves_surplus_to_credit() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        let issued = invoice(&ledger, 1, 1, 10_000);

        let receipt = ledger.record_payment(payment(1, 12_500, "k1")).unwrap();

        assert_eq!(receipt.new_balance, Money::ZERO);
        assert_eq!(receipt.credit_balance, Money::from_minor(2_500));
        assert_eq!(ledger.invoice(issued.id).unwrap().status, InvoiceStatus::Paid);

        let recorded = ledger.payment(receipt.payment).unwrap();
        assert_eq!(recorded.surplus, Money::from_minor(2_500));
        let kinds: Vec<TransactionKind> =
            ledger.transactions_for(1).iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TransactionKind::Invoice,
                TransactionKind::Payment,
                TransactionKind::CreditDeposit
            ]
        );
    }

    #[test]
    fn test_payment_without_invoices_becomes_credit() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);

        let receipt = ledger.record_payment(payment(1, 5_000, "advance")).unwrap();

        assert_eq!(receipt.new_balance, Money::ZERO);
        assert_eq!(receipt.credit_balance, Money::from_minor(5_000));
    }

    #[test]
    fn test_allocation_prefers_requested_term_then_oldest() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        let term1 = invoice(&ledger, 1, 1, 3_000);
        let term2 = invoice(&ledger, 1, 2, 3_000);
        let term3 = invoice(&ledger, 1, 3, 3_000);

        let mut request = payment(1, 4_000, "k1");
        request.term = Some(3);
        let receipt = ledger.record_payment(request).unwrap();

        let allocations = ledger.payment(receipt.payment).unwrap().allocations;
        assert_eq!(
            allocations,
            vec![
                Allocation { invoice: term3.id, amount: Money::from_minor(3_000) },
                Allocation { invoice: term1.id, amount: Money::from_minor(1_000) },
            ]
        );
        assert_eq!(ledger.invoice(term2.id).unwrap().balance, Money::from_minor(3_000));
        assert_eq!(ledger.invoice(term3.id).unwrap().status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_receipt_is_a_snapshot() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);
        let first = ledger.record_payment(payment(1, 4_000, "k1")).unwrap();
        ledger.record_payment(payment(1, 1_000, "k2")).unwrap();

        let stored = ledger.payment(first.payment).unwrap().receipt;

        assert_eq!(stored.new_balance, Money::from_minor(6_000));
        assert_eq!(ledger.account(1).unwrap().balance, Money::from_minor(5_000));
    }

    #[test]
    fn test_bank_account_recorded_on_transaction() {
        let ledger = ledger();
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 10_000);

        let mut request = payment(1, 4_000, "k1");
        request.bank_account = Some(3);
        let receipt = ledger.record_payment(request).unwrap();

        let recorded = ledger.payment(receipt.payment).unwrap();
        let transaction = ledger.transaction(recorded.transaction).unwrap();
        assert_eq!(transaction.bank_account, Some(3));
        assert_eq!(transaction.amount, Money::from_minor(-4_000));
        assert_eq!(ledger.invoices_for(1)[0].academic_year, YEAR);
    }

    #[test]
    fn test_concurrent_retries_record_one_payment() {
        let ledger = Arc::new(ledger());
        register(&ledger, 1, "Form 1", StudentType::Day);
        invoice(&ledger, 1, 1, 100_000);
        let mut handles = vec![];

        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                ledger.record_payment(payment(1, 4_000, "k1")).unwrap()
            }));
        }

        let receipts: HashSet<String> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().receipt_number)
            .collect();

        assert_eq!(receipts.len(), 1);
        assert_eq!(ledger.transactions_for(1).len(), 2);
        assert_eq!(ledger.account(1).unwrap().balance, Money::from_minor(96_000));
        assert_eq!(
            ledger.reconstruct_balances(1).unwrap(),
            (Money::from_minor(96_000), Money::ZERO)
        );
    }

    #[test]
    fn test_concurrent_payments_for_different_students() {
        let ledger = Arc::new(ledger());
        for student in 1..=8 {
            register(&ledger, student, "Form 1", StudentType::Day);
            invoice(&ledger, student, 1, 10_000);
        }
        let mut handles = vec![];

        for student in 1..=8 {
            for key in ["a", "b", "c"] {
                let ledger = Arc::clone(&ledger);
                handles.push(thread::spawn(move || {
                    ledger.record_payment(payment(student, 1_000, key)).unwrap()
                }));
            }
        }

        let receipts: HashSet<String> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().receipt_number)
            .collect();

        assert_eq!(receipts.len(), 24);
        for student in 1..=8 {
            let account = ledger.account(student).unwrap();
            assert_eq!(account.balance, Money::from_minor(7_000));
            assert_eq!(ledger.transactions_for(student).len(), 4);
            assert_eq!(
                ledger.reconstruct_balances(student).unwrap(),
                (account.balance, account.credit_balance)
            );
        }
    }
}
