//! Promotion Audit Records
//!
//! A `PromotionRecord` is written exactly once per applied transition and is
//! never updated or deleted afterwards. It embeds denormalized enrollment
//! snapshots so history stays readable after catalog rows change.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::records::{CourseOffering, Enrollment, EnrollmentStatus};

/// Point-in-time copy of one enrollment and the course it referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    pub enrollment_id: Uuid,
    pub course_offering_id: Uuid,
    /// Course code at snapshot time. Empty when the course row was missing.
    pub course_code: String,
    /// Course level binding at snapshot time.
    pub course_level_id: Option<Uuid>,
    pub period_id: Uuid,
    pub status: EnrollmentStatus,
}

impl EnrollmentSnapshot {
    /// Capture an enrollment together with its (possibly missing) course.
    pub fn capture(enrollment: &Enrollment, course: Option<&CourseOffering>) -> Self {
        Self {
            enrollment_id: enrollment.id,
            course_offering_id: enrollment.course_offering_id,
            course_code: course.map(|c| c.code.clone()).unwrap_or_default(),
            course_level_id: course.and_then(|c| c.level_id),
            period_id: enrollment.period_id,
            status: enrollment.status,
        }
    }
}

/// Course-id sets describing one enrollment diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<Uuid>,
    pub removed: BTreeSet<Uuid>,
    pub retained: BTreeSet<Uuid>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Immutable audit entry for one student's level transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    /// `None` when the student had no level before the transition.
    pub from_level_id: Option<Uuid>,
    pub to_level_id: Uuid,
    pub triggered_by: String,
    pub previous_enrollments: Vec<EnrollmentSnapshot>,
    pub new_enrollments: Vec<EnrollmentSnapshot>,
    pub changes: ChangeSet,
    pub note: Option<String>,
    /// Correlation id shared by every record written in one run.
    pub execution_id: Uuid,
    /// Optional id of the academic progression (cycle close) the run belongs to.
    pub progression_id: Option<Uuid>,
    pub execution_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Correlation filter used to select promotion records for revert.
///
/// When both ids are set, a record must match both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationFilter {
    pub execution_id: Option<Uuid>,
    pub progression_id: Option<Uuid>,
}

impl CorrelationFilter {
    pub fn by_execution(execution_id: Uuid) -> Self {
        Self {
            execution_id: Some(execution_id),
            progression_id: None,
        }
    }

    pub fn by_progression(progression_id: Uuid) -> Self {
        Self {
            execution_id: None,
            progression_id: Some(progression_id),
        }
    }

    /// A filter with no ids would match every record in the tenant.
    pub fn is_empty(&self) -> bool {
        self.execution_id.is_none() && self.progression_id.is_none()
    }

    pub fn matches(&self, record: &PromotionRecord) -> bool {
        if self.is_empty() {
            return false;
        }
        let execution_ok = self
            .execution_id
            .map_or(true, |id| record.execution_id == id);
        let progression_ok = self
            .progression_id
            .map_or(true, |id| record.progression_id == Some(id));
        execution_ok && progression_ok
    }
}
