//! Bank statement CSV reading and writing
//!
//! Statement exports differ between banks, so the reader accepts a couple of
//! common header spellings and leaves every value as text. Parsing dates and
//! amounts happens in the importer, which reports all bad rows together.

use crate::types::{BankStatementLine, LedgerError, RawStatementLine, ValidationIssue};
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
struct StatementCsvRow {
    #[serde(default, alias = "transaction_date", alias = "value_date")]
    date: String,
    #[serde(default, alias = "narration", alias = "details")]
    description: String,
    #[serde(default, alias = "debit_amount", alias = "withdrawal")]
    debit: String,
    #[serde(default, alias = "credit_amount", alias = "deposit")]
    credit: String,
}

/// Rows read from a statement file
///
/// `issues` holds the rows the CSV layer could not decode; they are missing
/// from `lines`. Field-level checks still run on the decoded rows, so both
/// kinds of problem can be reported together.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatementRows {
    pub lines: Vec<RawStatementLine>,
    pub issues: Vec<ValidationIssue>,
}

/// Read statement rows from CSV
///
/// Expected header: `date, description, debit, credit`. Rows are numbered
/// from 1, counting data rows only.
///
/// # Errors
///
/// Returns an error only if the reader itself fails. Undecodable rows are
/// collected in `StatementRows::issues`.
pub fn read_statement_lines<R: Read>(reader: R) -> Result<StatementRows, LedgerError> {
    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = StatementRows::default();

    for (index, result) in csv_reader.deserialize::<StatementCsvRow>().enumerate() {
        let row = index + 1;
        match result {
            Ok(raw) => rows.lines.push(RawStatementLine {
                row,
                transaction_date: raw.date,
                description: raw.description,
                debit: raw.debit,
                credit: raw.credit,
            }),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => rows
                .issues
                .push(ValidationIssue::at_row(row, "record", e.to_string())),
        }
    }

    Ok(rows)
}

/// Open and read a statement CSV file
pub fn load_statement_lines(path: &Path) -> Result<StatementRows, LedgerError> {
    let file = File::open(path).map_err(|e| LedgerError::IoError {
        message: format!("Failed to open statement '{}': {}", path.display(), e),
    })?;
    read_statement_lines(file)
}

/// Write persisted statement lines as CSV
///
/// Columns: `line, date, description, debit, credit`.
pub fn write_statement_lines_csv(
    lines: &[BankStatementLine],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["line", "date", "description", "debit", "credit"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for line in lines {
        writer
            .write_record(&[
                line.id.to_string(),
                line.transaction_date.format("%Y-%m-%d").to_string(),
                line.description.clone(),
                line.debit_amount.to_string(),
                line.credit_amount.to_string(),
            ])
            .map_err(|e| format!("Failed to write statement line: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))
}
