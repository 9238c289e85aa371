//! CSV format handling for journals, fee structures and balance output
//!
//! This module centralizes the tabular formats the ledger reads and writes:
//! - `JournalCsvRow` for replay journals, converted into `JournalRecord`s
//! - the fee structure table loaded by `FeeStructure`
//! - the per-student balance table written after a replay
//!
//! Conversion functions are pure so they can be tested without touching disk.

use crate::types::{
    AcademicYearId, FeeStructureRow, JournalOp, JournalRecord, LedgerError, Money, PaymentMethod,
    StudentAccount, StudentId, StudentType, TermId, ValidationIssue,
};
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::io::{Read, Write};

/// Fee category used for journal invoices that do not name one
pub const DEFAULT_FEE_CATEGORY: &str = "FEES";

/// One row of a replay journal
///
/// Columns: `type, student, amount, key, method, reference, year, term, reason`.
/// Only `type` and `student` are required by every operation; trailing
/// columns may be left out entirely.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct JournalCsvRow {
    #[serde(rename = "type")]
    pub op: String,
    pub student: StudentId,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub year: Option<AcademicYearId>,
    #[serde(default)]
    pub term: Option<TermId>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn required<'a>(field: &'a Option<String>, name: &str, row: &JournalCsvRow) -> Result<&'a str, String> {
    present(field).ok_or_else(|| {
        format!(
            "{} for student {} requires {}",
            row.op.trim().to_lowercase(),
            row.student,
            name
        )
    })
}

fn parse_amount(raw: &str, student: StudentId) -> Result<Money, String> {
    Money::from_major_str(raw).map_err(|e| format!("Invalid amount for student {}: {}", student, e))
}

/// Convert a journal row into a `JournalRecord`
///
/// Shape checks only: the ledger validates amounts, references and state
/// when the record is applied.
///
/// # Errors
///
/// Returns a message if the operation type is unknown, a field the operation
/// needs is missing, or a field cannot be parsed.
pub fn convert_journal_row(row: JournalCsvRow) -> Result<JournalRecord, String> {
    let op = match row.op.trim().to_lowercase().as_str() {
        "invoice" => {
            let amount = parse_amount(required(&row.amount, "an amount", &row)?, row.student)?;
            let academic_year = row
                .year
                .ok_or_else(|| format!("invoice for student {} requires a year", row.student))?;
            let term = row
                .term
                .ok_or_else(|| format!("invoice for student {} requires a term", row.student))?;
            JournalOp::Invoice {
                academic_year,
                term,
                fee_category: present(&row.reference)
                    .unwrap_or(DEFAULT_FEE_CATEGORY)
                    .to_uppercase(),
                amount,
            }
        }
        "payment" => {
            let amount = parse_amount(required(&row.amount, "an amount", &row)?, row.student)?;
            let idempotency_key = required(&row.key, "a key", &row)?.to_string();
            let method = match present(&row.method) {
                Some(raw) => raw.parse::<PaymentMethod>()?,
                None => PaymentMethod::Cash,
            };
            JournalOp::Payment {
                amount,
                idempotency_key,
                method,
                reference: present(&row.reference).unwrap_or_default().to_string(),
                term: row.term,
            }
        }
        "credit" => JournalOp::Credit {
            limit: present(&row.amount)
                .map(|raw| parse_amount(raw, row.student))
                .transpose()?,
        },
        "void" => JournalOp::Void {
            idempotency_key: required(&row.key, "a key", &row)?.to_string(),
            reason: present(&row.reason).unwrap_or_default().to_string(),
        },
        other => {
            return Err(format!(
                "Invalid operation type: '{}' for student {}",
                other, row.student
            ))
        }
    };

    Ok(JournalRecord {
        student: row.student,
        op,
    })
}

/// Write student balances in CSV format
///
/// Columns: `student, balance, credit_balance`, amounts in major units with
/// two decimal places. Rows are sorted by student for deterministic output.
///
/// # Errors
///
/// Returns a message if the writer fails.
pub fn write_balances_csv(accounts: &[StudentAccount], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["student", "balance", "credit_balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&StudentAccount> = accounts.iter().collect();
    sorted.sort_by_key(|account| account.student);

    for account in sorted {
        writer
            .write_record(&[
                account.student.to_string(),
                account.balance.to_string(),
                account.credit_balance.to_string(),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[derive(Debug, Deserialize)]
struct FeeStructureCsvRow {
    academic_year: AcademicYearId,
    term: TermId,
    stream: String,
    student_type: String,
    fee_category: String,
    amount: String,
}

/// Read a fee structure table
///
/// Columns: `academic_year, term, stream, student_type, fee_category, amount`.
/// Every row is checked before anything is returned so a bad table reports
/// all of its problems at once.
///
/// # Errors
///
/// Returns `LedgerError::Validation` listing each bad row, or an I/O error if
/// the reader fails.
pub fn read_fee_structure<R: Read>(reader: R) -> Result<Vec<FeeStructureRow>, LedgerError> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    let mut issues = Vec::new();

    for (index, result) in csv_reader.deserialize::<FeeStructureCsvRow>().enumerate() {
        let row_number = index + 1;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                issues.push(ValidationIssue::at_row(row_number, "record", e.to_string()));
                continue;
            }
        };

        let before = issues.len();

        let student_type = match raw.student_type.parse::<StudentType>() {
            Ok(student_type) => Some(student_type),
            Err(e) => {
                issues.push(ValidationIssue::at_row(row_number, "student_type", e));
                None
            }
        };
        let amount = match Money::from_major_str(&raw.amount) {
            Ok(amount) if amount.is_positive() => Some(amount),
            Ok(_) => {
                issues.push(ValidationIssue::at_row(row_number, "amount", "must be positive"));
                None
            }
            Err(e) => {
                issues.push(ValidationIssue::at_row(row_number, "amount", e));
                None
            }
        };
        if raw.fee_category.is_empty() {
            issues.push(ValidationIssue::at_row(row_number, "fee_category", "is required"));
        }

        if let (Some(student_type), Some(amount), true) =
            (student_type, amount, issues.len() == before)
        {
            rows.push(FeeStructureRow {
                academic_year: raw.academic_year,
                term: raw.term,
                stream: raw.stream,
                student_type,
                fee_category: raw.fee_category.to_uppercase(),
                amount,
            });
        }
    }

    if issues.is_empty() {
        Ok(rows)
    } else {
        Err(LedgerError::validation_issues(
            format!("fee structure has {} problem(s)", issues.len()),
            issues,
        ))
    }
}
