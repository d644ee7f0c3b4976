//! Progression Request Types
//!
//! Requests are plain values built with `with_*` setters. Format checks
//! (nil ids, empty correlation filters) happen before any store access.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::CorrelationFilter;

/// Identity of one progression run. Every audit record written by the run
/// carries these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCorrelation {
    pub execution_id: Uuid,
    pub progression_id: Option<Uuid>,
    pub execution_at: DateTime<Utc>,
}

impl RunCorrelation {
    /// Fresh execution id, stamped now.
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            progression_id: None,
            execution_at: Utc::now(),
        }
    }

    pub fn with_execution_id(mut self, execution_id: Uuid) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn with_progression_id(mut self, progression_id: Uuid) -> Self {
        self.progression_id = Some(progression_id);
        self
    }

    pub fn with_execution_at(mut self, execution_at: DateTime<Utc>) -> Self {
        self.execution_at = execution_at;
        self
    }
}

impl Default for RunCorrelation {
    fn default() -> Self {
        Self::new()
    }
}

/// Request to move one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRequest {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    /// Explicit destination. Wins over the rank successor.
    pub target_level_id: Option<Uuid>,
    /// Actor recorded on the audit row. Engine default when `None`.
    pub triggered_by: Option<String>,
    pub dry_run: bool,
    pub note: Option<String>,
    pub correlation: RunCorrelation,
}

impl PromotionRequest {
    pub fn new(tenant_id: Uuid, student_id: Uuid) -> Self {
        Self {
            tenant_id,
            student_id,
            target_level_id: None,
            triggered_by: None,
            dry_run: false,
            note: None,
            correlation: RunCorrelation::new(),
        }
    }

    pub fn with_target(mut self, level_id: Uuid) -> Self {
        self.target_level_id = Some(level_id);
        self
    }

    pub fn with_triggered_by(mut self, actor: impl Into<String>) -> Self {
        self.triggered_by = Some(actor.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_correlation(mut self, correlation: RunCorrelation) -> Self {
        self.correlation = correlation;
        self
    }

    /// Returns `Some(reason)` if the request is malformed.
    pub fn validate_format(&self) -> Option<&'static str> {
        if self.tenant_id.is_nil() {
            return Some("tenant_id cannot be nil UUID");
        }
        if self.student_id.is_nil() {
            return Some("student_id cannot be nil UUID");
        }
        if self.target_level_id.map_or(false, |id| id.is_nil()) {
            return Some("target_level_id cannot be nil UUID");
        }
        None
    }
}

/// Request to promote every student of a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub tenant_id: Uuid,
    pub triggered_by: Option<String>,
    pub dry_run: bool,
    pub note: Option<String>,
    pub correlation: RunCorrelation,
}

impl BatchRequest {
    pub fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            triggered_by: None,
            dry_run: false,
            note: None,
            correlation: RunCorrelation::new(),
        }
    }

    pub fn with_triggered_by(mut self, actor: impl Into<String>) -> Self {
        self.triggered_by = Some(actor.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_correlation(mut self, correlation: RunCorrelation) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn validate_format(&self) -> Option<&'static str> {
        if self.tenant_id.is_nil() {
            return Some("tenant_id cannot be nil UUID");
        }
        None
    }
}

/// What a revert restores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RevertScope {
    /// Only the student's level pointer.
    #[default]
    LevelOnly,
    /// Level pointer plus the recorded enrollment diff, replayed in reverse.
    LevelAndEnrollments,
}

/// Request to undo the records of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertRequest {
    pub tenant_id: Uuid,
    pub filter: CorrelationFilter,
    pub scope: RevertScope,
}

impl RevertRequest {
    pub fn new(tenant_id: Uuid, filter: CorrelationFilter) -> Self {
        Self {
            tenant_id,
            filter,
            scope: RevertScope::LevelOnly,
        }
    }

    pub fn by_execution(tenant_id: Uuid, execution_id: Uuid) -> Self {
        Self::new(tenant_id, CorrelationFilter::by_execution(execution_id))
    }

    pub fn with_scope(mut self, scope: RevertScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn validate_format(&self) -> Option<&'static str> {
        if self.tenant_id.is_nil() {
            return Some("tenant_id cannot be nil UUID");
        }
        if self.filter.is_empty() {
            return Some("execution_id or progression_id is required");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_request_defaults() {
        let request = PromotionRequest::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(request.target_level_id.is_none());
        assert!(!request.dry_run);
        assert!(request.validate_format().is_none());
    }

    #[test]
    fn test_promotion_request_nil_ids() {
        let request = PromotionRequest::new(Uuid::nil(), Uuid::new_v4());
        assert!(request.validate_format().unwrap().contains("tenant_id"));

        let request = PromotionRequest::new(Uuid::new_v4(), Uuid::nil());
        assert!(request.validate_format().unwrap().contains("student_id"));

        let request = PromotionRequest::new(Uuid::new_v4(), Uuid::new_v4()).with_target(Uuid::nil());
        assert!(request.validate_format().is_some());
    }

    #[test]
    fn test_revert_requires_correlation_id() {
        let request = RevertRequest::new(Uuid::new_v4(), CorrelationFilter::default());
        assert!(request.validate_format().is_some());

        let request = RevertRequest::by_execution(Uuid::new_v4(), Uuid::new_v4());
        assert!(request.validate_format().is_none());
        assert_eq!(request.scope, RevertScope::LevelOnly);
    }

    #[test]
    fn test_correlation_builder() {
        let progression = Uuid::new_v4();
        let corr = RunCorrelation::new().with_progression_id(progression);
        assert_eq!(corr.progression_id, Some(progression));
        assert!(!corr.execution_id.is_nil());
    }
}
