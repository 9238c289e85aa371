//! Payment voids
//!
//! Voiding never edits or deletes the original rows. It appends a
//! `PaymentVoid` of `+amount`, restores every invoice allocation and, when
//! the payment left a surplus, withdraws it again with a `CreditReversal` of
//! `-surplus`.

use crate::core::ledger::FeeLedger;
use crate::types::{
    AuditAction, AuditEntry, Invoice, LedgerError, PaymentId, PaymentStatus, Posting,
    TransactionKind, UserId, VoidOutcome,
};
use chrono::Utc;
use tracing::info;

impl FeeLedger {
    /// Reverse a posted payment
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown payment
    /// - `InvalidState` if the payment is already voided
    /// - `Validation` for a blank reason
    /// - `InsufficientCredit` if the surplus the payment created has since
    ///   been spent
    pub fn void_payment(
        &self,
        payment: PaymentId,
        reason: &str,
        actor: UserId,
    ) -> Result<VoidOutcome, LedgerError> {
        let student = self
            .payment(payment)
            .ok_or_else(|| LedgerError::not_found("payment", payment))?
            .student;
        let reason = reason.trim();

        let (before, after, outcome) = self.accounts.with_account(student, |account| {
            let current = self
                .payment(payment)
                .ok_or_else(|| LedgerError::not_found("payment", payment))?;

            if current.status == PaymentStatus::Voided {
                return Err(LedgerError::invalid_state(
                    "payment",
                    payment,
                    "void",
                    "payment is already voided",
                ));
            }
            if reason.is_empty() {
                return Err(LedgerError::validation("void reason is required"));
            }
            if current.surplus > account.credit_balance {
                return Err(LedgerError::insufficient_credit(
                    student,
                    account.credit_balance,
                    current.surplus,
                ));
            }

            let restored = current
                .allocations
                .iter()
                .map(|allocation| {
                    let mut invoice = self
                        .invoice(allocation.invoice)
                        .ok_or_else(|| LedgerError::not_found("invoice", allocation.invoice))?;
                    invoice.restore(allocation.amount)?;
                    Ok(invoice)
                })
                .collect::<Result<Vec<Invoice>, LedgerError>>()?;

            let mut postings = vec![Posting {
                kind: TransactionKind::PaymentVoid,
                amount: current.amount,
                reference: payment,
                bank_account: current.bank_account,
                description: format!("Void {}: {}", current.receipt_number, reason),
            }];
            if current.surplus.is_positive() {
                let amount = current.surplus.checked_neg().ok_or_else(|| {
                    LedgerError::arithmetic_overflow("credit reversal", student)
                })?;
                postings.push(Posting {
                    kind: TransactionKind::CreditReversal,
                    amount,
                    reference: payment,
                    bank_account: None,
                    description: format!("Reverse surplus of {}", current.receipt_number),
                });
            }

            let transactions = self.post(account, postings, actor)?;
            let reversal = transactions.first().map(|t| t.id).ok_or_else(|| {
                LedgerError::invalid_state("payment", payment, "void", "no ledger transaction was posted")
            })?;

            for invoice in restored {
                self.invoices.insert(invoice.id, invoice);
            }

            let mut voided = current.clone();
            voided.status = PaymentStatus::Voided;
            voided.voided_by = Some(actor);
            voided.voided_at = Some(Utc::now());
            voided.void_reason = Some(reason.to_string());
            self.payments.insert(payment, voided.clone());

            let outcome = VoidOutcome {
                payment,
                reversal,
                new_balance: account.balance,
                credit_balance: account.credit_balance,
            };
            Ok((current, voided, outcome))
        })?;

        self.record_audit(
            AuditEntry::new(actor, AuditAction::Void, "payments", payment)
                .before(&before)
                .after(&after),
        );
        info!(
            student,
            receipt = %after.receipt_number,
            amount = %after.amount,
            reason,
            "payment voided"
        );
        Ok(outcome)
    }
}
