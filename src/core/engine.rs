//! Journal replay orchestration
//!
//! `ReplayEngine` turns parsed journal rows into ledger operations. It is the
//! single entry point both processing strategies drive, so a journal replays
//! to the same balances whichever strategy runs it.

use crate::core::ledger::FeeLedger;
use crate::types::{
    InvoiceLineItem, JournalOp, JournalRecord, LedgerError, NewInvoice, PaymentRequest,
    StudentAccount, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Applies journal records to a shared ledger
///
/// Cloning is cheap and every clone drives the same ledger, so the engine
/// can be handed to concurrent tasks.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    ledger: Arc<FeeLedger>,
    /// Recorded as the actor of every replayed operation
    actor: UserId,
}

impl ReplayEngine {
    pub fn new(ledger: Arc<FeeLedger>, actor: UserId) -> Self {
        Self { ledger, actor }
    }

    pub fn ledger(&self) -> &Arc<FeeLedger> {
        &self.ledger
    }

    /// Apply one journal record
    ///
    /// A student seen for the first time is registered with a placeholder
    /// profile before the operation runs, and stays registered even if the
    /// operation is rejected. Errors are the ledger's own; a rejected record
    /// posts nothing to the journal and leaves balances unchanged.
    pub fn process(&self, record: JournalRecord) -> Result<(), LedgerError> {
        let student = record.student;
        if self.ledger.account(student).is_none() {
            debug!(student, "registering student first seen in journal");
            self.ledger.ensure_student(student);
        }

        match record.op {
            JournalOp::Invoice {
                academic_year,
                term,
                fee_category,
                amount,
            } => self
                .ledger
                .create_invoice(
                    NewInvoice {
                        student,
                        academic_year,
                        term,
                        line_items: vec![InvoiceLineItem {
                            fee_category,
                            amount,
                        }],
                    },
                    self.actor,
                )
                .map(|_| ()),
            JournalOp::Payment {
                amount,
                idempotency_key,
                method,
                reference,
                term,
            } => self
                .ledger
                .record_payment(PaymentRequest {
                    student,
                    amount,
                    method,
                    reference,
                    idempotency_key,
                    description: None,
                    term,
                    bank_account: None,
                    actor: self.actor,
                })
                .map(|_| ()),
            JournalOp::Credit { limit } => self
                .ledger
                .apply_credit_to_pending(student, limit, self.actor)
                .map(|_| ()),
            JournalOp::Void {
                idempotency_key,
                reason,
            } => {
                let payment = self
                    .ledger
                    .payment_by_key(student, &idempotency_key)
                    .ok_or_else(|| {
                        LedgerError::validation(format!(
                            "no payment with idempotency key '{}' for student {}",
                            idempotency_key, student
                        ))
                    })?;
                self.ledger
                    .void_payment(payment.id, &reason, self.actor)
                    .map(|_| ())
            }
        }
    }

    /// Final state of every account, sorted by student id
    pub fn accounts(&self) -> Vec<StudentAccount> {
        self.ledger.accounts()
    }
}
