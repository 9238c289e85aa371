use crate::core::parse_statement_date;
use crate::strategy::BatchConfig;
use crate::types::{BankAccountId, Money, UserId};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// School fee ledger: replay journals and import bank statements
#[derive(Parser, Debug)]
#[command(name = "fee-ledger")]
#[command(about = "Replay fee journals and import bank statements", long_about = None)]
pub struct CliArgs {
    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a journal CSV and print final student balances
    Replay(ReplayArgs),

    /// Validate a bank statement CSV and print its lines
    ImportStatement(ImportStatementArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[arg(value_name = "INPUT", help = "Path to the journal CSV file")]
    pub input_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for student-partitioned parallel"
    )]
    pub strategy: StrategyType,

    /// Journal records per batch (async mode only)
    #[arg(long = "batch-size", value_name = "SIZE")]
    pub batch_size: Option<usize>,

    /// Worker threads for batch replay (async mode only, default: CPU cores)
    #[arg(long = "max-concurrent", value_name = "COUNT")]
    pub max_concurrent_batches: Option<usize>,

    /// User id recorded on every replayed operation
    #[arg(long = "actor", value_name = "USER", default_value_t = 0)]
    pub actor: UserId,
}

#[derive(Args, Debug)]
pub struct ImportStatementArgs {
    #[arg(value_name = "CSV", help = "Path to the statement CSV file")]
    pub input_file: PathBuf,

    #[arg(long = "bank-account", value_name = "ID")]
    pub bank_account: BankAccountId,

    /// Statement date, YYYY-MM-DD or DD/MM/YYYY
    #[arg(long = "date", value_name = "DATE", value_parser = parse_date_arg)]
    pub statement_date: NaiveDate,

    /// Opening balance in major units
    #[arg(long = "opening", value_name = "AMOUNT", allow_hyphen_values = true)]
    pub opening_balance: Money,

    /// Closing balance in major units
    #[arg(long = "closing", value_name = "AMOUNT", allow_hyphen_values = true)]
    pub closing_balance: Money,

    #[arg(long = "reference", value_name = "REF", default_value = "")]
    pub reference: String,

    #[arg(long = "actor", value_name = "USER", default_value_t = 0)]
    pub actor: UserId,
}

fn parse_date_arg(input: &str) -> Result<NaiveDate, String> {
    parse_statement_date(input).ok_or_else(|| format!("'{}' is not a valid date", input))
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl ReplayArgs {
    /// Batch configuration from the CLI options, defaults for anything unset
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_none() && self.max_concurrent_batches.is_none() {
            return BatchConfig::default();
        }
        let default = BatchConfig::default();
        BatchConfig::new(
            self.batch_size.unwrap_or(default.batch_size),
            self.max_concurrent_batches
                .unwrap_or(default.max_concurrent_batches),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn replay_args(args: &[&str]) -> ReplayArgs {
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::Replay(replay) => replay,
            other => panic!("expected replay, got {:?}", other),
        }
    }

    fn import_args(args: &[&str]) -> ImportStatementArgs {
        match CliArgs::try_parse_from(args).unwrap().command {
            Command::ImportStatement(import) => import,
            other => panic!("expected import-statement, got {:?}", other),
        }
    }

    #[rstest]
    #[case::default_strategy(&["program", "replay", "journal.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "replay", "--strategy", "sync", "journal.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "replay", "--strategy", "async", "journal.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        assert_eq!(replay_args(args).strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "replay", "journal.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "replay", "--batch-size", "2000", "journal.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "replay", "--max-concurrent", "8", "journal.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "replay", "--batch-size", "0", "journal.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "replay", "--max-concurrent", "0", "journal.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = replay_args(args).to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_log_level_is_global() {
        let parsed =
            CliArgs::try_parse_from(["program", "replay", "journal.csv", "--log-level", "debug"])
                .unwrap();
        assert_eq!(parsed.log_level, "debug");

        let parsed = CliArgs::try_parse_from(["program", "replay", "journal.csv"]).unwrap();
        assert_eq!(parsed.log_level, "info");
    }

    #[test]
    fn test_import_statement_arguments() {
        let args = import_args(&[
            "program",
            "import-statement",
            "statement.csv",
            "--bank-account",
            "3",
            "--date",
            "31/01/2024",
            "--opening",
            "1,000.00",
            "--closing",
            "6000",
            "--reference",
            "JAN-2024",
        ]);

        assert_eq!(args.bank_account, 3);
        assert_eq!(args.statement_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(args.opening_balance, Money::from_minor(100_000));
        assert_eq!(args.closing_balance, Money::from_minor(600_000));
        assert_eq!(args.reference, "JAN-2024");
        assert_eq!(args.actor, 0);
    }

    #[rstest]
    #[case::no_subcommand(&["program"])]
    #[case::missing_input(&["program", "replay"])]
    #[case::invalid_strategy(&["program", "replay", "--strategy", "invalid", "journal.csv"])]
    #[case::bad_date(&["program", "import-statement", "s.csv", "--bank-account", "1", "--date", "Jan 31", "--opening", "0", "--closing", "0"])]
    #[case::bad_amount(&["program", "import-statement", "s.csv", "--bank-account", "1", "--date", "2024-01-31", "--opening", "1.005", "--closing", "0"])]
    #[case::missing_bank_account(&["program", "import-statement", "s.csv", "--date", "2024-01-31", "--opening", "0", "--closing", "0"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
