// CLI module
// Command-line interface and argument parsing

mod args;
pub mod import_statement;

pub use args::{CliArgs, Command, ImportStatementArgs, ReplayArgs, StrategyType};

use clap::Parser;

/// Parse command-line arguments
///
/// On invalid arguments or `--help`, clap prints the message and exits.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
