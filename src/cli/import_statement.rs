//! `import-statement` subcommand

use crate::cli::ImportStatementArgs;
use crate::core::{validate_statement_lines, FeeLedger};
use crate::io::statement_csv::{load_statement_lines, write_statement_lines_csv};
use crate::types::{BankAccount, LedgerError, StatementImport};
use std::io::Write;
use tracing::info;

/// Validate a statement file and write its parsed lines to `output`
///
/// The statement is imported into a throwaway ledger holding only the named
/// bank account, so every row goes through the same validation as a real
/// import.
///
/// # Errors
///
/// Returns the importer's error; for a bad file that is a
/// `LedgerError::Validation` listing every problem row, undecodable rows
/// included.
pub fn run(args: &ImportStatementArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let ledger = FeeLedger::default();
    ledger.register_bank_account(
        BankAccount {
            id: args.bank_account,
            account_name: format!("Account {}", args.bank_account),
            bank_name: String::new(),
        },
        args.actor,
    )?;

    let rows = load_statement_lines(&args.input_file)?;
    if !rows.issues.is_empty() {
        let mut issues = rows.issues;
        if !rows.lines.is_empty() {
            if let Err(more) = validate_statement_lines(&rows.lines) {
                issues.extend(more);
            }
        }
        issues.sort_by_key(|issue| issue.row);
        return Err(LedgerError::validation_issues(
            format!("statement has {} problem(s)", issues.len()),
            issues,
        ));
    }

    let statement_id = ledger.import_statement(
        StatementImport {
            bank_account: args.bank_account,
            statement_date: args.statement_date,
            opening_balance: args.opening_balance,
            closing_balance: args.closing_balance,
            reference: args.reference.clone(),
            lines: rows.lines,
        },
        args.actor,
    )?;

    let statement = ledger
        .statement(statement_id)
        .ok_or_else(|| LedgerError::not_found("statement", statement_id))?;
    info!(
        statement = statement.id,
        lines = statement.lines.len(),
        "statement validated"
    );

    write_statement_lines_csv(&statement.lines, output)
        .map_err(|message| LedgerError::IoError { message })
}
