//! CLI argument definitions using clap
//!
//! Commands:
//! - progression init --data <path> [--import <json>]
//! - progression preview --data <path> --tenant <uuid>
//! - progression promote --data <path> --tenant <uuid> [--dry-run]
//! - progression promote-one --data <path> --tenant <uuid> --student <uuid>
//! - progression revert --data <path> --tenant <uuid> --execution-id <uuid>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Academic progression engine
#[derive(Parser, Debug)]
#[command(name = "progression")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that opens a data file.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to data file
    #[arg(long, default_value = "./progression.data")]
    pub data: PathBuf,

    /// Tenant (school) id
    #[arg(long)]
    pub tenant: Uuid,
}

/// Options describing who runs a write and why.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Compute the outcome without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Actor recorded on audit records
    #[arg(long)]
    pub triggered_by: Option<String>,

    /// Free-text note recorded on audit records
    #[arg(long)]
    pub note: Option<String>,

    /// Academic progression this run belongs to
    #[arg(long)]
    pub progression_id: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new data file
    Init {
        /// Path to data file
        #[arg(long, default_value = "./progression.data")]
        data: PathBuf,

        /// Plain JSON dataset to seed the file with
        #[arg(long)]
        import: Option<PathBuf>,
    },

    /// Show what a batch run would do
    Preview {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Promote every student of a tenant
    Promote {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Promote one student
    PromoteOne {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Student id
        #[arg(long)]
        student: Uuid,

        /// Explicit destination level (defaults to the next rank)
        #[arg(long)]
        target: Option<Uuid>,
    },

    /// Undo the level changes of one run
    Revert {
        #[command(flatten)]
        store: StoreArgs,

        /// Execution id of the run to undo
        #[arg(long)]
        execution_id: Option<Uuid>,

        /// Academic progression to undo
        #[arg(long)]
        progression_id: Option<Uuid>,

        /// Also replay the recorded enrollment changes in reverse
        #[arg(long)]
        with_enrollments: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
