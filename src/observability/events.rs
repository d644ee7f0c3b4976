//! Observability events for the progression engine
//!
//! Every observable point of a run has a typed event. Event names are
//! stable strings so log consumers can match on them.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,

    // Hierarchy resolution
    /// Tenant-scoped level query was empty; levels derived from students
    LevelFallbackUsed,
    /// Tenant-scoped student query was empty; students derived from levels
    StudentFallbackUsed,
    /// No level could be resolved for the tenant
    HierarchyEmpty,

    // Single-student transitions
    /// Transition applied and audited
    PromotionApplied,
    /// Transition computed but not persisted
    PromotionPreviewed,
    /// No next level and no explicit target
    PromotionTerminal,
    /// Destination equals current level
    PromotionNoOp,
    /// No period resolvable for new enrollments; additions skipped
    EnrollmentPeriodUnresolved,

    // Batch
    /// Student promoted to the next rank
    StudentPromoted,
    /// Student moved to the terminal level
    StudentGraduated,
    /// Student held back by threshold policy
    StudentRetained,
    /// Student already at its destination
    StudentUnchanged,
    /// Student processing failed and was isolated
    StudentFailed,

    // Revert
    /// Level pointer restored from an audit record
    RevertApplied,
    /// Record had no prior level to restore
    RevertSkipped,
    /// No audit record matched the correlation ids
    RevertNoMatch,

    // Store
    /// Transaction committed
    StoreCommit,
    /// Transaction rolled back
    StoreRollback,
    /// Data file failed verification (FATAL)
    StoreCorruption,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::LevelFallbackUsed => "LEVEL_FALLBACK_USED",
            Event::StudentFallbackUsed => "STUDENT_FALLBACK_USED",
            Event::HierarchyEmpty => "HIERARCHY_EMPTY",

            Event::PromotionApplied => "PROMOTION_APPLIED",
            Event::PromotionPreviewed => "PROMOTION_PREVIEWED",
            Event::PromotionTerminal => "PROMOTION_TERMINAL",
            Event::PromotionNoOp => "PROMOTION_NOOP",
            Event::EnrollmentPeriodUnresolved => "ENROLLMENT_PERIOD_UNRESOLVED",

            Event::StudentPromoted => "STUDENT_PROMOTED",
            Event::StudentGraduated => "STUDENT_GRADUATED",
            Event::StudentRetained => "STUDENT_RETAINED",
            Event::StudentUnchanged => "STUDENT_UNCHANGED",
            Event::StudentFailed => "STUDENT_FAILED",

            Event::RevertApplied => "REVERT_APPLIED",
            Event::RevertSkipped => "REVERT_SKIPPED",
            Event::RevertNoMatch => "REVERT_NO_MATCH",

            Event::StoreCommit => "STORE_COMMIT",
            Event::StoreRollback => "STORE_ROLLBACK",
            Event::StoreCorruption => "STORE_CORRUPTION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreCorruption)
    }

    /// Returns true if this event marks a degraded-mode decision
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Event::LevelFallbackUsed | Event::StudentFallbackUsed | Event::EnrollmentPeriodUnresolved
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
