//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - journal row conversion, fee structure loading, balance output
//! - `statement_csv` - bank statement files
//! - `sync_reader` - synchronous journal reader with iterator interface
//! - `async_reader` - asynchronous journal reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod statement_csv;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_journal_row, read_fee_structure, write_balances_csv, JournalCsvRow};
pub use statement_csv::{
    load_statement_lines, read_statement_lines, write_statement_lines_csv, StatementRows,
};
pub use sync_reader::SyncReader;
