//! CLI-specific error types
//!
//! Every CLI error ends the invocation with a non-zero exit code.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::progression::{ProgressionError, ProgressionErrorKind};
use crate::storage::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Data file already exists
    AlreadyInitialized,
    /// Data file missing
    NotInitialized,
    /// Data file unreadable or failed verification
    StoreError,
    /// Engine rejected or aborted the operation
    Progression(ProgressionErrorKind),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PROGRESSION_CLI_CONFIG_ERROR",
            Self::IoError => "PROGRESSION_CLI_IO_ERROR",
            Self::AlreadyInitialized => "PROGRESSION_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "PROGRESSION_CLI_NOT_INITIALIZED",
            Self::StoreError => "PROGRESSION_CLI_STORE_ERROR",
            Self::Progression(kind) => kind.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Data file already exists
    pub fn already_initialized(path: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            format!("Data file {} already exists", path),
        )
    }

    /// Data file missing
    pub fn not_initialized(path: impl fmt::Display) -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            format!("Data file {} not found. Run 'progression init' first.", path),
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::new(CliErrorCode::StoreError, e.to_string())
    }
}

impl From<ProgressionError> for CliError {
    fn from(e: ProgressionError) -> Self {
        Self::new(CliErrorCode::Progression(e.kind), e.message)
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progression_errors_keep_engine_code() {
        let err: CliError = ProgressionError::configuration("no terminal level").into();
        assert_eq!(err.code_str(), "PROGRESSION_CONFIGURATION");
        assert_eq!(err.message(), "no terminal level");
    }

    #[test]
    fn test_display_format() {
        let err = CliError::not_initialized("/tmp/x.data");
        assert!(err.to_string().starts_with("PROGRESSION_CLI_NOT_INITIALIZED: "));
    }
}
