//! Student-partitioned parallel replay strategy
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (student partitioning + tokio tasks)
//!     └── ReplayEngine → FeeLedger (DashMap-backed, per-student locking)
//! ```
//!
//! Batches are processed one after another so a student's records keep their
//! file order even when they span batches. Within a batch, different
//! students replay concurrently on the multi-threaded runtime.

use crate::core::{BatchProcessor, FeeLedger, ReplayEngine};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{finish_replay, ProcessingStrategy};
use crate::types::UserId;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Batch sizing and worker count for the parallel strategy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Journal records per batch
    pub batch_size: usize,
    /// Worker threads in the replay runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Build a config, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                default = default.batch_size,
                "batch_size must be positive, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                default = default.max_concurrent_batches,
                "max_concurrent_batches must be positive, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Parallel replay strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    actor: UserId,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, actor: UserId) -> Self {
        Self { config, actor }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let ledger = Arc::new(FeeLedger::default());
            let engine = Arc::new(ReplayEngine::new(Arc::clone(&ledger), self.actor));
            let processor = BatchProcessor::new(engine);

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0;
            let mut rejected = 0;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                // Wait for the whole batch so a student's later records never
                // overtake earlier ones from the previous batch.
                for outcome in processor.process_batch(batch).await {
                    match outcome.result {
                        Ok(()) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(
                                student = outcome.record.student,
                                op = outcome.record.op.name(),
                                kind = ?e.kind(),
                                error = %e,
                                "journal record rejected"
                            );
                        }
                    }
                }
            }

            finish_replay(&ledger, applied, rejected, output)
        })
    }
}
