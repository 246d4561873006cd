//! CLI argument definitions using clap
//!
//! Commands:
//! - sdstore init <store>
//! - sdstore query <store> --field F --value V [--operator OP] [--raw]
//! - sdstore ingest <store> <input> [--filter-field F --filter-value V]
//! - sdstore append <store>
//! - sdstore unlock <store>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sdstore - a simple persistent JSON document store
#[derive(Parser, Debug)]
#[command(name = "sdstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Store configuration file (JSON); the store path argument overrides its `path`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log lifecycle events at INFO to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a store file holding only the metadata record
    Init {
        /// Store file path
        store: PathBuf,
    },

    /// Print the documents matching one field condition
    Query {
        /// Store file path
        store: PathBuf,

        /// Field name (top-level key, or JSON pointer starting with '/')
        #[arg(long)]
        field: String,

        /// Value to compare against, parsed as JSON when valid
        #[arg(long)]
        value: String,

        /// equals, startsWith or contains
        #[arg(long, default_value = "equals")]
        operator: String,

        /// Always treat the value as a string
        #[arg(long)]
        raw: bool,
    },

    /// Add every document of a newline-delimited JSON file, then save once
    Ingest {
        /// Store file path
        store: PathBuf,

        /// Input file, one JSON document per line
        input: PathBuf,

        /// Only ingest documents whose field matches
        #[arg(long, requires = "filter_value")]
        filter_field: Option<String>,

        /// Value the filter field must match, parsed as JSON when valid
        #[arg(long, requires = "filter_field")]
        filter_value: Option<String>,

        /// Operator used by the filter
        #[arg(long, default_value = "equals")]
        filter_operator: String,
    },

    /// Durably append one JSON document read from stdin
    Append {
        /// Store file path
        store: PathBuf,
    },

    /// Remove an orphaned lock marker
    Unlock {
        /// Store file path
        store: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
