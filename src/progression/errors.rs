//! Progression Error Types
//!
//! NotFound, Configuration, InvalidRequest and Storage abort the enclosing
//! operation. PerEntityFailure is only ever produced at the per-student
//! boundary of a batch and recorded, never propagated.

use std::fmt;

use uuid::Uuid;

use crate::storage::StoreError;

/// Progression error type
#[derive(Debug)]
pub struct ProgressionError {
    /// Error kind
    pub kind: ProgressionErrorKind,
    /// Error message
    pub message: String,
    /// Underlying store error, if any
    source: Option<StoreError>,
}

/// Progression error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionErrorKind {
    /// Student or level missing
    NotFound,

    /// No levels, no terminal level, or no progression period
    Configuration,

    /// Failure while processing one student inside a batch
    PerEntityFailure,

    /// Arguments cannot describe a valid operation
    InvalidRequest,

    /// Store read/write/commit failed
    Storage,
}

impl ProgressionErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "PROGRESSION_NOT_FOUND",
            Self::Configuration => "PROGRESSION_CONFIGURATION",
            Self::PerEntityFailure => "PROGRESSION_ENTITY_FAILURE",
            Self::InvalidRequest => "PROGRESSION_INVALID_REQUEST",
            Self::Storage => "PROGRESSION_STORAGE",
        }
    }
}

impl ProgressionError {
    pub fn new(kind: ProgressionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn student_not_found(student_id: Uuid) -> Self {
        Self::new(
            ProgressionErrorKind::NotFound,
            format!("student {} not found in tenant", student_id),
        )
    }

    pub fn level_not_found(level_id: Uuid) -> Self {
        Self::new(
            ProgressionErrorKind::NotFound,
            format!("level {} not found", level_id),
        )
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProgressionErrorKind::Configuration, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProgressionErrorKind::InvalidRequest, message)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Underlying store error, if this error came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_ref()
    }
}

impl fmt::Display for ProgressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ProgressionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<StoreError> for ProgressionError {
    fn from(e: StoreError) -> Self {
        let kind = match e {
            StoreError::NotFound { .. } => ProgressionErrorKind::NotFound,
            _ => ProgressionErrorKind::Storage,
        };
        Self {
            kind,
            message: e.to_string(),
            source: Some(e),
        }
    }
}

/// Result type for progression operations
pub type ProgressionResult<T> = Result<T, ProgressionError>;
