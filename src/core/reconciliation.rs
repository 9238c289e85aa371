//! Matching bank statement lines to ledger transactions
//!
//! Matching is always confirmed by a user; the ledger only validates the
//! pairing and proposes candidates. A line and a transaction each take part
//! in at most one match, and a match is never undone.
//!
//! # Lock Order
//!
//! `match_transaction` holds the statement entry while it takes the journal
//! entry, so the already-matched checks and the match insert are atomic.
//! Nothing takes a statement entry while holding a journal entry.

use crate::core::ledger::FeeLedger;
use crate::types::{
    AuditAction, AuditEntry, BankAccountId, BankStatementLine, LedgerError, LedgerTransaction,
    MatchLink, Money, ReconciliationSummary, StatementId, StatementLineId, StatementStatus,
    TransactionId, UserId,
};
use chrono::Utc;
use tracing::info;

impl FeeLedger {
    /// Confirm that a statement line and a ledger transaction record the
    /// same money movement
    ///
    /// A credit line of `C` pairs with a transaction of `-C` (money received
    /// against fees); a debit line of `D` pairs with `+D` (money paid back
    /// out).
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown statement, line or transaction
    /// - `InvalidState` if the statement is already reconciled
    /// - `Validation` if the line belongs to another statement or the
    ///   transaction is not a cash movement
    /// - `AlreadyMatched` if either side is already matched
    /// - `AmountMismatch` if the amounts do not pair up
    /// - `AccountMismatch` if the transaction was deposited to another account
    pub fn match_transaction(
        &self,
        statement: StatementId,
        line: StatementLineId,
        transaction: TransactionId,
        actor: UserId,
    ) -> Result<MatchLink, LedgerError> {
        let owner = self
            .line_index
            .get(&line)
            .map(|entry| *entry.value())
            .ok_or_else(|| LedgerError::not_found("statement line", line))?;

        let mut entry = self
            .statements
            .get_mut(&statement)
            .ok_or_else(|| LedgerError::not_found("statement", statement))?;
        let bank_statement = entry.value_mut();

        if bank_statement.status != StatementStatus::Open {
            return Err(LedgerError::invalid_state(
                "statement",
                statement,
                "match",
                "statement is already reconciled",
            ));
        }
        if owner != statement {
            return Err(LedgerError::validation(format!(
                "statement line {} belongs to statement {}, not {}",
                line, owner, statement
            )));
        }

        let statement_account = bank_statement.bank_account;
        let statement_line = bank_statement
            .lines
            .iter_mut()
            .find(|l| l.id == line)
            .ok_or_else(|| LedgerError::not_found("statement line", line))?;
        if statement_line.is_matched {
            return Err(LedgerError::already_matched("statement line", line));
        }
        let expected = statement_line
            .expected_ledger_amount()
            .ok_or_else(|| LedgerError::validation("statement line amount is out of range"))?;

        self.journal.with_entry(transaction, |ledger_transaction| {
            check_pairing(ledger_transaction, line, expected, statement_account)?;
            ledger_transaction.matched = true;
            Ok(())
        })?;
        statement_line.is_matched = true;

        let link = MatchLink {
            statement_line: line,
            ledger_transaction: transaction,
            matched_by: actor,
            matched_at: Utc::now(),
        };
        self.matches.insert(line, link.clone());
        drop(entry);

        self.record_audit(
            AuditEntry::new(actor, AuditAction::Match, "reconciliation_matches", line).after(&link),
        );
        info!(statement, line, transaction, "statement line matched");
        Ok(link)
    }

    /// Unmatched lines of a statement, in statement order
    pub fn unmatched_lines(
        &self,
        statement: StatementId,
    ) -> Result<Vec<BankStatementLine>, LedgerError> {
        let entry = self
            .statements
            .get(&statement)
            .ok_or_else(|| LedgerError::not_found("statement", statement))?;
        Ok(entry
            .lines
            .iter()
            .filter(|line| !line.is_matched)
            .cloned()
            .collect())
    }

    /// Unmatched cash movements that may appear on `bank_account`'s statements
    pub fn unmatched_transactions(&self, bank_account: BankAccountId) -> Vec<LedgerTransaction> {
        self.journal.unmatched_cash(bank_account)
    }

    /// Unmatched transactions whose amount pairs with a statement line
    ///
    /// These are proposals for the user to confirm with
    /// [`FeeLedger::match_transaction`]; nothing is matched here.
    pub fn candidates_for_line(
        &self,
        statement: StatementId,
        line: StatementLineId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let (bank_account, statement_line) = {
            let entry = self
                .statements
                .get(&statement)
                .ok_or_else(|| LedgerError::not_found("statement", statement))?;
            let statement_line = entry
                .line(line)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("statement line", line))?;
            (entry.bank_account, statement_line)
        };

        if statement_line.is_matched {
            return Ok(Vec::new());
        }
        let expected = statement_line
            .expected_ledger_amount()
            .ok_or_else(|| LedgerError::validation("statement line amount is out of range"))?;

        Ok(self
            .journal
            .unmatched_cash(bank_account)
            .into_iter()
            .filter(|transaction| transaction.amount == expected)
            .collect())
    }

    /// Match link recorded for a statement line
    pub fn match_for_line(&self, line: StatementLineId) -> Option<MatchLink> {
        self.matches.get(&line).map(|entry| entry.value().clone())
    }

    /// Matching progress of a statement
    pub fn reconciliation_summary(
        &self,
        statement: StatementId,
    ) -> Result<ReconciliationSummary, LedgerError> {
        let entry = self
            .statements
            .get(&statement)
            .ok_or_else(|| LedgerError::not_found("statement", statement))?;

        let unmatched: Vec<&BankStatementLine> =
            entry.lines.iter().filter(|line| !line.is_matched).collect();
        let unmatched_credits = Money::checked_sum(unmatched.iter().map(|l| l.credit_amount))
            .ok_or_else(|| LedgerError::validation("unmatched credit total is out of range"))?;
        let unmatched_debits = Money::checked_sum(unmatched.iter().map(|l| l.debit_amount))
            .ok_or_else(|| LedgerError::validation("unmatched debit total is out of range"))?;

        Ok(ReconciliationSummary {
            statement,
            status: entry.status,
            total_lines: entry.lines.len(),
            matched_lines: entry.lines.len() - unmatched.len(),
            unmatched_credits,
            unmatched_debits,
        })
    }

    /// Close a fully matched statement
    ///
    /// # Errors
    ///
    /// `InvalidState` if the statement is already reconciled or still has
    /// unmatched lines.
    pub fn complete_reconciliation(
        &self,
        statement: StatementId,
        actor: UserId,
    ) -> Result<ReconciliationSummary, LedgerError> {
        {
            let mut entry = self
                .statements
                .get_mut(&statement)
                .ok_or_else(|| LedgerError::not_found("statement", statement))?;

            if entry.status == StatementStatus::Reconciled {
                return Err(LedgerError::invalid_state(
                    "statement",
                    statement,
                    "complete reconciliation of",
                    "statement is already reconciled",
                ));
            }
            let unmatched = entry.lines.iter().filter(|line| !line.is_matched).count();
            if unmatched > 0 {
                return Err(LedgerError::invalid_state(
                    "statement",
                    statement,
                    "complete reconciliation of",
                    format!("{} line(s) are still unmatched", unmatched),
                ));
            }
            entry.status = StatementStatus::Reconciled;
        }

        let summary = self.reconciliation_summary(statement)?;
        self.record_audit(AuditEntry::new(
            actor,
            AuditAction::Update,
            "bank_statements",
            statement,
        ));
        info!(statement, lines = summary.total_lines, "statement reconciled");
        Ok(summary)
    }
}

/// Check that a transaction can be matched to a line expecting `expected`
fn check_pairing(
    transaction: &LedgerTransaction,
    line: StatementLineId,
    expected: Money,
    statement_account: BankAccountId,
) -> Result<(), LedgerError> {
    if !transaction.kind.is_cash_movement() {
        return Err(LedgerError::validation(format!(
            "transaction {} is a {:?} posting, not a cash movement",
            transaction.id, transaction.kind
        )));
    }
    if transaction.matched {
        return Err(LedgerError::already_matched("transaction", transaction.id));
    }
    if transaction.amount != expected {
        return Err(LedgerError::amount_mismatch(
            line,
            transaction.id,
            expected,
            transaction.amount,
        ));
    }
    if let Some(account) = transaction.bank_account {
        if account != statement_account {
            return Err(LedgerError::account_mismatch(
                transaction.id,
                account,
                statement_account,
            ));
        }
    }
    Ok(())
}
