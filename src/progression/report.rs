//! Progression outcomes
//!
//! Reports are plain serializable values. The CLI prints them as JSON.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use super::errors::{ProgressionError, ProgressionErrorKind};

/// Terminal state of a single-student evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    /// No destination exists; nothing changed.
    Terminal,
    /// Destination equals the current level; nothing changed.
    NoOp,
    /// Transition computed in dry-run mode; nothing persisted.
    Previewed,
    /// Transition applied and audited.
    Applied,
}

impl PromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::NoOp => "no_op",
            Self::Previewed => "previewed",
            Self::Applied => "applied",
        }
    }
}

/// Outcome of one student's evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    pub student_id: Uuid,
    pub from_level_id: Option<Uuid>,
    /// `None` only for `Terminal`.
    pub to_level_id: Option<Uuid>,
    pub added_course_ids: BTreeSet<Uuid>,
    pub removed_course_ids: BTreeSet<Uuid>,
    pub retained_course_ids: BTreeSet<Uuid>,
    pub dry_run: bool,
    pub status: PromotionStatus,
    /// Audit record id, set only for `Applied`.
    pub record_id: Option<Uuid>,
}

impl PromotionReport {
    /// Report for an evaluation that changed nothing.
    pub(crate) fn unchanged(
        student_id: Uuid,
        from_level_id: Option<Uuid>,
        to_level_id: Option<Uuid>,
        dry_run: bool,
        status: PromotionStatus,
    ) -> Self {
        Self {
            student_id,
            from_level_id,
            to_level_id,
            added_course_ids: BTreeSet::new(),
            removed_course_ids: BTreeSet::new(),
            retained_course_ids: BTreeSet::new(),
            dry_run,
            status,
            record_id: None,
        }
    }

    /// Whether the student's level pointer moved (or would move).
    pub fn is_transition(&self) -> bool {
        matches!(self.status, PromotionStatus::Applied | PromotionStatus::Previewed)
    }
}

/// One isolated per-student failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityError {
    pub student_id: Uuid,
    /// Kind of the underlying failure.
    pub kind: ProgressionErrorKind,
    pub message: String,
}

impl EntityError {
    pub fn new(student_id: Uuid, kind: ProgressionErrorKind, message: impl Into<String>) -> Self {
        Self {
            student_id,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(student_id: Uuid, error: &ProgressionError) -> Self {
        Self::new(student_id, error.kind, error.message.clone())
    }

    pub fn code(&self) -> &'static str {
        ProgressionErrorKind::PerEntityFailure.code()
    }
}

/// Outcome of a batch run.
///
/// `errors.len() + promoted + graduated + retained + unchanged == total`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub execution_id: Uuid,
    pub progression_id: Option<Uuid>,
    /// Period the run was evaluated against.
    pub period_id: Option<Uuid>,
    pub promoted_count: usize,
    pub graduated_count: usize,
    pub retained_count: usize,
    pub unchanged_count: usize,
    pub total_count: usize,
    pub errors: Vec<EntityError>,
    pub dry_run: bool,
}

impl BatchReport {
    pub(crate) fn empty(execution_id: Uuid, progression_id: Option<Uuid>, dry_run: bool) -> Self {
        Self {
            execution_id,
            progression_id,
            period_id: None,
            promoted_count: 0,
            graduated_count: 0,
            retained_count: 0,
            unchanged_count: 0,
            total_count: 0,
            errors: Vec::new(),
            dry_run,
        }
    }

    /// Sum of every outcome bucket. Equals `total_count` on a finished run.
    pub fn accounted(&self) -> usize {
        self.errors.len()
            + self.promoted_count
            + self.graduated_count
            + self.retained_count
            + self.unchanged_count
    }
}

/// Projected outcome for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewAction {
    Promote,
    Graduate,
    /// Already on the terminal level
    Unchanged,
    /// No level assigned, or the level row is missing
    Error,
}

/// One row of a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewRow {
    pub student_id: Uuid,
    pub student_name: String,
    pub from_level_id: Option<Uuid>,
    /// Next level, or the terminal level when graduating and one is configured.
    pub to_level_id: Option<Uuid>,
    pub action: PreviewAction,
    /// Set for `Error` rows.
    pub reason: Option<String>,
}

/// Read-only projection of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreviewReport {
    pub rows: Vec<PreviewRow>,
    pub promote_count: usize,
    pub graduate_count: usize,
    pub unchanged_count: usize,
    pub error_count: usize,
}

impl PreviewReport {
    pub(crate) fn push(&mut self, row: PreviewRow) {
        match row.action {
            PreviewAction::Promote => self.promote_count += 1,
            PreviewAction::Graduate => self.graduate_count += 1,
            PreviewAction::Unchanged => self.unchanged_count += 1,
            PreviewAction::Error => self.error_count += 1,
        }
        self.rows.push(row);
    }

    pub fn total_count(&self) -> usize {
        self.rows.len()
    }
}

/// Outcome of a revert run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    pub reverted_count: usize,
    pub errors: Vec<EntityError>,
    /// Records matching the correlation ids, before per-student grouping.
    pub matched_records: usize,
}
