//! CLI module for sdstore
//!
//! Provides command-line interface for:
//! - init: Create a store file
//! - query: One-shot query
//! - ingest: Bulk load newline-delimited JSON
//! - append: Durable single-document append
//! - unlock: Manual lock cleanup

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{append, ingest, init, query_store, run, run_command, store_config, unlock};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_document, read_documents, write_error, write_response};
