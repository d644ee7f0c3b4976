//! CLI module for the progression engine
//!
//! Provides command-line interface for:
//! - init: Create a data file
//! - preview: Project a batch run
//! - promote: Run a batch for a tenant
//! - promote-one: Move one student
//! - revert: Undo a run by correlation id

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, RunArgs, StoreArgs};
pub use commands::{execute, init, preview, promote, promote_one, revert, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
