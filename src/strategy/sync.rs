//! Sequential replay strategy
//!
//! Streams journal rows one at a time through `SyncReader` and applies them
//! in file order on the calling thread. Memory grows with the ledger, not
//! with the size of the journal file.

use crate::core::{FeeLedger, ReplayEngine};
use crate::io::sync_reader::SyncReader;
use crate::strategy::{finish_replay, ProcessingStrategy};
use crate::types::UserId;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Sequential replay strategy
///
/// ```no_run
/// use fee_ledger::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(0);
/// strategy
///     .process(Path::new("journal.csv"), &mut std::io::stdout())
///     .expect("replay failed");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessingStrategy {
    actor: UserId,
}

impl SyncProcessingStrategy {
    pub fn new(actor: UserId) -> Self {
        Self { actor }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let reader = SyncReader::new(input_path)?;
        let engine = ReplayEngine::new(Arc::new(FeeLedger::default()), self.actor);

        let mut applied = 0;
        let mut rejected = 0;
        for result in reader {
            match result {
                Ok(record) => {
                    let student = record.student;
                    let op = record.op.name();
                    match engine.process(record) {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(student, op, kind = ?e.kind(), error = %e, "journal record rejected");
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "unreadable journal row");
                }
            }
        }

        finish_replay(engine.ledger(), applied, rejected, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,student,amount,key,method,reference,year,term,reason\n";

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "{}{}", HEADER, rows).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn replay(rows: &str) -> String {
        let file = create_temp_csv(rows);
        let mut output = Vec::new();
        SyncProcessingStrategy::new(1)
            .process(file.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_sync_strategy_invoice_and_partial_payment() {
        let output = replay(
            "invoice,1,10000,,,,2024,1,\n\
             payment,1,4000,k1,,,,,\n\
             payment,1,4000,k1,,,,,\n",
        );

        assert_eq!(output, "student,balance,credit_balance\n1,6000.00,0.00\n");
    }

    #[test]
    fn test_sync_strategy_overpayment_then_credit_application() {
        let output = replay(
            "payment,2,1500,k1,,,,,\n\
             invoice,2,1000,,,,2024,1,\n\
             credit,2,,,,,,,\n",
        );

        assert_eq!(output, "student,balance,credit_balance\n2,0.00,500.00\n");
    }

    #[test]
    fn test_sync_strategy_void_restores_balance() {
        let output = replay(
            "invoice,3,1000,,,,2024,1,\n\
             payment,3,1000,k1,,,,,\n\
             void,3,,k1,,,,,posted to wrong student\n",
        );

        assert_eq!(output, "student,balance,credit_balance\n3,1000.00,0.00\n");
    }

    #[test]
    fn test_sync_strategy_continues_after_rejected_records() {
        let output = replay(
            "invoice,1,100,,,,2024,1,\n\
             invoice,1,100,,,,2024,1,\n\
             payment,2,abc,k1,,,,,\n\
             void,1,,missing,,,,,typo\n\
             payment,1,40,k1,,,,,\n",
        );

        assert_eq!(output, "student,balance,credit_balance\n1,60.00,0.00\n");
    }

    #[test]
    fn test_sync_strategy_handles_missing_file() {
        let result = SyncProcessingStrategy::default()
            .process(Path::new("nonexistent.csv"), &mut Vec::new());
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
