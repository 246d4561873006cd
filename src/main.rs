//! sdstore CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. The response or
//! error object goes to stdout; the error is repeated on stderr and the
//! process exits non-zero.

use sdstore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
