//! Shared fixtures for ledger unit tests

use crate::core::audit_log::MemoryAuditLog;
use crate::core::fee_structure::FeeStructure;
use crate::core::ledger::FeeLedger;
use crate::types::{
    AcademicYearId, BankAccount, BankAccountId, FeeStructureRow, Invoice, InvoiceLineItem, Money,
    NewInvoice, PaymentMethod, PaymentRequest, RawStatementLine, StudentId, StudentProfile,
    StudentType, TermId,
};
use std::sync::Arc;

pub const YEAR: AcademicYearId = 2024;

fn fee_row(student_type: StudentType, category: &str, minor: i64) -> FeeStructureRow {
    FeeStructureRow {
        academic_year: YEAR,
        term: 1,
        stream: "Form 1".to_string(),
        student_type,
        fee_category: category.to_string(),
        amount: Money::from_minor(minor),
    }
}

/// Ledger whose fee structure covers Form 1 day scholars and boarders in
/// term 1, auditing into memory
pub fn ledger_with_log() -> (FeeLedger, Arc<MemoryAuditLog>) {
    let fees = FeeStructure::new(vec![
        fee_row(StudentType::Day, "TUITION", 1_000_000),
        fee_row(StudentType::Boarder, "TUITION", 1_000_000),
        fee_row(StudentType::Boarder, "BOARDING", 500_000),
    ]);
    let log = Arc::new(MemoryAuditLog::new());
    (FeeLedger::new(Arc::new(fees), log.clone()), log)
}

pub fn ledger() -> FeeLedger {
    ledger_with_log().0
}

pub fn register(ledger: &FeeLedger, student: StudentId, stream: &str, student_type: StudentType) {
    ledger.register_student(
        StudentProfile {
            student,
            stream: stream.to_string(),
            student_type,
            active: true,
        },
        1,
    );
}

/// Issue a single-item invoice for `YEAR`
pub fn invoice(ledger: &FeeLedger, student: StudentId, term: TermId, minor: i64) -> Invoice {
    ledger
        .create_invoice(
            NewInvoice {
                student,
                academic_year: YEAR,
                term,
                line_items: vec![InvoiceLineItem {
                    fee_category: "TUITION".to_string(),
                    amount: Money::from_minor(minor),
                }],
            },
            1,
        )
        .unwrap()
}

/// Cash payment request with no term preference or bank account
pub fn payment(student: StudentId, minor: i64, key: &str) -> PaymentRequest {
    PaymentRequest {
        student,
        amount: Money::from_minor(minor),
        method: PaymentMethod::Cash,
        reference: format!("REF-{}", key.trim()),
        idempotency_key: key.to_string(),
        description: None,
        term: None,
        bank_account: None,
        actor: 1,
    }
}

pub fn bank_account(ledger: &FeeLedger, id: BankAccountId) {
    ledger
        .register_bank_account(
            BankAccount {
                id,
                account_name: format!("Fees collection {}", id),
                bank_name: "Equity".to_string(),
            },
            1,
        )
        .unwrap();
}

pub fn raw_line(
    row: usize,
    date: &str,
    description: &str,
    debit: &str,
    credit: &str,
) -> RawStatementLine {
    RawStatementLine {
        row,
        transaction_date: date.to_string(),
        description: description.to_string(),
        debit: debit.to_string(),
        credit: credit.to_string(),
    }
}
