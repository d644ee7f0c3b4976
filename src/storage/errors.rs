//! Store error types
//!
//! Error codes:
//! - PROGRESSION_STORE_NOT_FOUND
//! - PROGRESSION_STORE_CONSTRAINT
//! - PROGRESSION_STORE_CONFLICT
//! - PROGRESSION_STORE_IO_ERROR
//! - PROGRESSION_STORE_CORRUPTION (fatal)
//! - PROGRESSION_STORE_INVALID_SAVEPOINT
//! - PROGRESSION_STORE_POISONED (fatal)

use std::io;

use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} row not found: {id}")]
    NotFound { table: &'static str, id: Uuid },

    #[error("constraint violated on {table}: {reason}")]
    Constraint { table: &'static str, reason: String },

    #[error("concurrent commit detected: base revision {base}, found {found}")]
    Conflict { base: u64, found: u64 },

    #[error("I/O error on {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("data file corrupted: {0}")]
    Corruption(String),

    #[error("savepoint {0} is not active")]
    InvalidSavepoint(usize),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn not_found(table: &'static str, id: Uuid) -> Self {
        Self::NotFound { table, id }
    }

    pub fn constraint(table: &'static str, reason: impl Into<String>) -> Self {
        Self::Constraint {
            table,
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "PROGRESSION_STORE_NOT_FOUND",
            Self::Constraint { .. } => "PROGRESSION_STORE_CONSTRAINT",
            Self::Conflict { .. } => "PROGRESSION_STORE_CONFLICT",
            Self::Io { .. } => "PROGRESSION_STORE_IO_ERROR",
            Self::Corruption(_) => "PROGRESSION_STORE_CORRUPTION",
            Self::InvalidSavepoint(_) => "PROGRESSION_STORE_INVALID_SAVEPOINT",
            Self::Poisoned => "PROGRESSION_STORE_POISONED",
        }
    }

    /// Fatal errors mean the backing data can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption(_) | Self::Poisoned)
    }
}
