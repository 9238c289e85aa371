//! Bank statement import
//!
//! Statement rows arrive as text. Every row is validated and every problem
//! collected before anything is stored, so one import attempt reports the
//! complete list of fixes needed. A valid statement is stored together with
//! all of its lines in one step.

use crate::core::ledger::FeeLedger;
use crate::types::{
    AuditAction, AuditEntry, BankAccount, BankAccountId, BankStatement, BankStatementLine,
    LedgerError, Money, RawStatementLine, StatementId, StatementImport, StatementLineInput,
    StatementStatus, UserId, ValidationIssue,
};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

/// Accepted statement date layouts: ISO first, then day-first
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Parse a statement date in `YYYY-MM-DD` or `DD/MM/YYYY` form
pub fn parse_statement_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

/// Parse an optional non-negative amount; blank means zero
fn parse_line_amount(
    row: usize,
    field: &str,
    input: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Money> {
    if input.trim().is_empty() {
        return Some(Money::ZERO);
    }
    match Money::from_major_str(input) {
        Ok(amount) if amount.is_negative() => {
            issues.push(ValidationIssue::at_row(
                row,
                field,
                format!("'{}' must not be negative", input.trim()),
            ));
            None
        }
        Ok(amount) => Some(amount),
        Err(message) => {
            issues.push(ValidationIssue::at_row(row, field, message));
            None
        }
    }
}

/// Validate raw statement rows
///
/// Returns the parsed lines, or every issue found across all rows.
pub fn validate_statement_lines(
    lines: &[RawStatementLine],
) -> Result<Vec<StatementLineInput>, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut parsed = Vec::with_capacity(lines.len());

    if lines.is_empty() {
        issues.push(ValidationIssue::new("lines", "statement has no lines"));
    }

    for line in lines {
        let row = line.row;

        let date = parse_statement_date(&line.transaction_date);
        if date.is_none() {
            issues.push(ValidationIssue::at_row(
                row,
                "date",
                format!(
                    "'{}' is not a date (expected YYYY-MM-DD or DD/MM/YYYY)",
                    line.transaction_date.trim()
                ),
            ));
        }

        let description = line.description.trim();
        if description.is_empty() {
            issues.push(ValidationIssue::at_row(row, "description", "is blank"));
        }

        let debit = parse_line_amount(row, "debit", &line.debit, &mut issues);
        let credit = parse_line_amount(row, "credit", &line.credit, &mut issues);

        if let (Some(debit), Some(credit)) = (debit, credit) {
            match (debit.is_zero(), credit.is_zero()) {
                (true, true) => issues.push(ValidationIssue::at_row(
                    row,
                    "amount",
                    "one of debit or credit must be non-zero",
                )),
                (false, false) => issues.push(ValidationIssue::at_row(
                    row,
                    "amount",
                    "only one of debit or credit may be non-zero",
                )),
                _ => {
                    if let Some(transaction_date) = date {
                        if !description.is_empty() {
                            parsed.push(StatementLineInput {
                                transaction_date,
                                description: description.to_string(),
                                debit_amount: debit,
                                credit_amount: credit,
                            });
                        }
                    }
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(parsed)
    } else {
        Err(issues)
    }
}

impl FeeLedger {
    /// Register one of the institution's bank accounts
    ///
    /// Registering an id again replaces its details.
    pub fn register_bank_account(
        &self,
        bank_account: BankAccount,
        actor: UserId,
    ) -> Result<(), LedgerError> {
        if bank_account.account_name.trim().is_empty() {
            return Err(LedgerError::validation("bank account name is required"));
        }
        let id = bank_account.id;
        self.record_audit(
            AuditEntry::new(actor, AuditAction::Create, "bank_accounts", u64::from(id))
                .after(&bank_account),
        );
        self.bank_accounts.insert(id, bank_account);
        info!(bank_account = id, "bank account registered");
        Ok(())
    }

    pub fn bank_account(&self, id: BankAccountId) -> Option<BankAccount> {
        self.bank_accounts.get(&id).map(|entry| entry.value().clone())
    }

    /// Validate and store a bank statement with all of its lines
    ///
    /// # Errors
    ///
    /// - `NotFound` if the bank account is not registered
    /// - `Validation` carrying every issue found in the rows
    pub fn import_statement(
        &self,
        import: StatementImport,
        actor: UserId,
    ) -> Result<StatementId, LedgerError> {
        if !self.bank_accounts.contains_key(&import.bank_account) {
            return Err(LedgerError::not_found(
                "bank account",
                u64::from(import.bank_account),
            ));
        }

        let parsed = validate_statement_lines(&import.lines).map_err(|issues| {
            LedgerError::validation_issues(
                format!("statement has {} problem(s)", issues.len()),
                issues,
            )
        })?;

        let id = self.sequences.next_statement();
        let lines: Vec<BankStatementLine> = parsed
            .into_iter()
            .map(|line| BankStatementLine {
                id: self.sequences.next_line(),
                statement: id,
                transaction_date: line.transaction_date,
                description: line.description,
                debit_amount: line.debit_amount,
                credit_amount: line.credit_amount,
                is_matched: false,
            })
            .collect();

        let statement = BankStatement {
            id,
            bank_account: import.bank_account,
            statement_date: import.statement_date,
            opening_balance: import.opening_balance,
            closing_balance: import.closing_balance,
            reference: import.reference.trim().to_string(),
            status: StatementStatus::Open,
            lines,
            imported_by: actor,
            imported_at: Utc::now(),
        };

        match statement.computed_closing() {
            Some(computed) if computed == statement.closing_balance => {}
            computed => warn!(
                statement = id,
                closing = %statement.closing_balance,
                computed = %computed.map(|c| c.to_string()).unwrap_or_else(|| "overflow".to_string()),
                "statement lines do not add up to the closing balance"
            ),
        }

        let line_ids: Vec<u64> = statement.lines.iter().map(|line| line.id).collect();
        let line_count = line_ids.len();
        for line in line_ids {
            self.line_index.insert(line, id);
        }
        self.statements.insert(id, statement.clone());

        self.record_audit(
            AuditEntry::new(actor, AuditAction::Import, "bank_statements", id).after(&statement),
        );
        info!(
            statement = id,
            bank_account = statement.bank_account,
            lines = line_count,
            "statement imported"
        );
        Ok(id)
    }

    pub fn statement(&self, statement: StatementId) -> Option<BankStatement> {
        self.statements.get(&statement).map(|entry| entry.value().clone())
    }
}
