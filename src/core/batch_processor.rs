//! Student-partitioned batch processing for the async replay strategy
//!
//! A batch of journal records is split by student. Each student's records
//! run sequentially in their original order on one tokio task, while
//! different students run concurrently. Records for one student never
//! touch another student's account, so the final balances match a
//! sequential replay.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::engine::ReplayEngine;
use crate::types::{JournalRecord, LedgerError, StudentId};
use tracing::error;

/// Outcome of replaying one record
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub record: JournalRecord,
    pub result: Result<(), LedgerError>,
}

/// Batch processor with student-based partitioning
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    engine: Arc<ReplayEngine>,
}

impl BatchProcessor {
    pub fn new(engine: Arc<ReplayEngine>) -> Self {
        Self { engine }
    }

    /// Split a batch into per-student sub-batches
    ///
    /// Every record lands in exactly one sub-batch, and each sub-batch keeps
    /// the records' original order.
    pub fn partition_by_student(
        &self,
        batch: Vec<JournalRecord>,
    ) -> HashMap<StudentId, Vec<JournalRecord>> {
        let mut student_batches: HashMap<StudentId, Vec<JournalRecord>> = HashMap::new();

        for record in batch {
            student_batches
                .entry(record.student)
                .or_default()
                .push(record);
        }

        student_batches
    }

    /// Replay one student's records in order
    ///
    /// A failed record does not stop the ones after it.
    pub async fn process_student_records(
        &self,
        records: Vec<JournalRecord>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let result = self.engine.process(record.clone());
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Replay a batch, one tokio task per student
    ///
    /// Results are grouped by student; their order across students is
    /// unspecified.
    pub async fn process_batch(&self, batch: Vec<JournalRecord>) -> Vec<ProcessingResult> {
        let student_batches = self.partition_by_student(batch);

        let mut tasks = Vec::with_capacity(student_batches.len());
        for (_student, records) in student_batches {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_student_records(records).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(student_results) => results.extend(student_results),
                Err(e) => error!(error = %e, "replay task panicked"),
            }
        }

        results
    }
}
