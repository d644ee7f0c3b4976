//! Progression CLI entry point
//!
//! Parses arguments, dispatches to the CLI module, and on failure prints
//! the error to stderr plus an error object on stdout, exiting non-zero.

use progression::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        let _ = cli::write_error(e.code_str(), e.message());
        std::process::exit(1);
    }
}
