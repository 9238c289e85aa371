//! School fee ledger CLI
//!
//! # Usage
//!
//! ```bash
//! cargo run -- replay journal.csv > balances.csv
//! cargo run -- replay --strategy sync journal.csv > balances.csv
//! cargo run -- replay --strategy async --batch-size 2000 --max-concurrent 8 journal.csv
//! cargo run -- import-statement statement.csv --bank-account 1 --date 2024-01-31 \
//!     --opening 0 --closing 4985.00 > lines.csv
//! ```
//!
//! `replay` applies a journal of invoice / payment / credit / void rows to a
//! fresh ledger and prints each student's balance and credit balance.
//! `import-statement` validates a bank statement file and prints its lines,
//! or lists every bad row.
//!
//! Logs go to stderr; `RUST_LOG` overrides `--log-level`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, invalid statement, output failure, etc.)

use fee_ledger::cli::{self, Command};
use fee_ledger::{logging, strategy};
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    logging::init(&args.log_level);

    let mut output = std::io::stdout();

    match args.command {
        Command::Replay(replay) => {
            let config = matches!(replay.strategy, cli::StrategyType::Async)
                .then(|| replay.to_batch_config());
            let strategy = strategy::create_strategy(replay.strategy, config, replay.actor);

            if let Err(e) = strategy.process(&replay.input_file, &mut output) {
                error!(error = %e, "replay failed");
                process::exit(1);
            }
        }
        Command::ImportStatement(import) => {
            if let Err(e) = cli::import_statement::run(&import, &mut output) {
                error!(kind = ?e.kind(), error = %e, "statement import failed");
                for issue in e.issues() {
                    error!(%issue, "statement problem");
                }
                process::exit(1);
            }
        }
    }
}
