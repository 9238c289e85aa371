//! Replay strategies
//!
//! A strategy is a complete replay pipeline: read a journal CSV, apply every
//! record to a fresh ledger, and write the final student balances. The
//! sequential and student-partitioned parallel implementations are selected
//! at runtime and produce the same balances for the same journal.

use crate::cli::StrategyType;
use crate::core::FeeLedger;
use crate::io::csv_format::write_balances_csv;
use crate::types::UserId;
use std::io::Write;
use std::path::Path;
use tracing::{error, info};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// A journal replay pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the journal at `input_path` and write balances to `output`
    ///
    /// Rejected records are logged and skipped; they never abort the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be opened, the output cannot be
    /// written, or the replayed ledger fails its balance reconstruction check.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String>;
}

/// Create a replay strategy
///
/// `config` only applies to the async strategy; `actor` is recorded on every
/// replayed operation.
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    actor: UserId,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(actor)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, actor))
        }
    }
}

/// Check every account against its journal, then write the balance table
///
/// Shared tail of both strategies.
pub(crate) fn finish_replay(
    ledger: &FeeLedger,
    applied: usize,
    rejected: usize,
    output: &mut dyn Write,
) -> Result<(), String> {
    let accounts = ledger.accounts();

    for account in &accounts {
        let reconstructed = ledger
            .reconstruct_balances(account.student)
            .map_err(|e| e.to_string())?;
        if reconstructed != (account.balance, account.credit_balance) {
            error!(
                student = account.student,
                balance = %account.balance,
                credit_balance = %account.credit_balance,
                "account balances disagree with journal"
            );
            return Err(format!(
                "Balances for student {} do not match the journal",
                account.student
            ));
        }
    }

    info!(
        applied,
        rejected,
        students = accounts.len(),
        transactions = ledger.journal.len(),
        "replay complete"
    );

    write_balances_csv(&accounts, output)
}
