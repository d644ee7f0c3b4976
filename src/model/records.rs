//! School Records
//!
//! Row types held by a tenant-scoped store. Every row carries its tenant id;
//! the store scopes reads by it, except for the legacy discovery paths that
//! deliberately ignore mis-tagged rows' tenant ids.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student: the entity being promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Display name, carried for operator output only.
    #[serde(default)]
    pub name: String,
    /// Level the student currently sits in. `None` until initial placement.
    pub current_level_id: Option<Uuid>,
}

impl Student {
    /// Create a student placed at `level_id`.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, level_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            current_level_id: level_id,
        }
    }
}

/// A ranked level (class / grade) within a tenant.
///
/// Rank defines the promotion order. There is no stored "next" pointer;
/// the successor is always derived from rank at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub rank: i32,
    pub name: String,
}

impl Level {
    pub fn new(tenant_id: Uuid, rank: i32, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            rank,
            name: name.into(),
        }
    }

    /// Whether this level carries the tenant's reserved terminal name.
    pub fn is_terminal(&self, terminal_name: &str) -> bool {
        self.name.eq_ignore_ascii_case(terminal_name)
    }
}

/// A course offering, optionally bound to a single level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOffering {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// `None` marks a cross-level elective. Electives are never removed by
    /// promotion.
    pub level_id: Option<Uuid>,
    #[serde(default)]
    pub enrollment_count: u32,
}

impl CourseOffering {
    pub fn new(tenant_id: Uuid, code: impl Into<String>, level_id: Option<Uuid>) -> Self {
        let code = code.into();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: code.clone(),
            code,
            level_id,
            enrollment_count: 0,
        }
    }

    /// Cross-level courses have no level binding.
    pub fn is_cross_level(&self) -> bool {
        self.level_id.is_none()
    }
}

/// Enrollment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Withdrawn => "withdrawn",
        }
    }
}

/// A student's registration in one course offering for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub course_offering_id: Uuid,
    pub period_id: Uuid,
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// Create an active enrollment.
    pub fn active(tenant_id: Uuid, student_id: Uuid, course_offering_id: Uuid, period_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            student_id,
            course_offering_id,
            period_id,
            status: EnrollmentStatus::Active,
        }
    }
}

/// An academic period (term) with its position inside the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// 1-based position inside the academic cycle.
    pub cycle_position: u8,
    #[serde(default)]
    pub is_current: bool,
}

impl Period {
    pub fn new(tenant_id: Uuid, start_date: NaiveDate, cycle_position: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            start_date,
            end_date: None,
            cycle_position,
            is_current: false,
        }
    }

    /// Whether the period has ended on or before `as_of`.
    ///
    /// Periods without an end date count as complete once they have started
    /// and are no longer current.
    pub fn is_completed(&self, as_of: NaiveDate) -> bool {
        if self.is_current {
            return false;
        }
        match self.end_date {
            Some(end) => end <= as_of,
            None => self.start_date <= as_of,
        }
    }
}

/// One aggregated performance row for a student in a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub period_id: Uuid,
    /// Percentage in `0.0..=100.0`. `None` when the score was never computed.
    pub percentage: Option<f64>,
}

impl ScoreRecord {
    /// A score is usable when it exists and is a finite number.
    pub fn usable_percentage(&self) -> Option<f64> {
        self.percentage.filter(|p| p.is_finite())
    }
}
