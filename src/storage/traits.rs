//! Store interfaces consumed by the progression engine.
//!
//! The engine never talks to a concrete backend. It receives a transaction
//! implementing these traits and issues reads and writes through it; the
//! transaction owner decides when to commit.

use uuid::Uuid;

use super::errors::StoreResult;
use crate::model::{
    CorrelationFilter, CourseOffering, Enrollment, Level, Period, PromotionRecord, ScoreRecord,
    Student,
};

/// Tenant-scoped CRUD over the school tables.
pub trait SchoolRecords {
    // -- students --

    /// Load one student scoped to `tenant_id`.
    fn student(&self, tenant_id: Uuid, student_id: Uuid) -> StoreResult<Option<Student>>;

    /// All students tagged with `tenant_id`, in stable store order.
    fn students(&self, tenant_id: Uuid) -> StoreResult<Vec<Student>>;

    /// Students whose current level is one of `level_ids`, regardless of
    /// their tenant tag. Legacy discovery only.
    fn students_in_levels(&self, level_ids: &[Uuid]) -> StoreResult<Vec<Student>>;

    fn set_student_level(&mut self, student_id: Uuid, level_id: Option<Uuid>) -> StoreResult<()>;

    // -- levels --

    /// Level by id. Ids are globally unique, the tenant tag is not checked.
    fn level(&self, level_id: Uuid) -> StoreResult<Option<Level>>;

    /// Levels tagged with `tenant_id`.
    fn levels(&self, tenant_id: Uuid) -> StoreResult<Vec<Level>>;

    /// Distinct levels referenced by the tenant's students. Legacy discovery only.
    fn levels_referenced_by_students(&self, tenant_id: Uuid) -> StoreResult<Vec<Level>>;

    /// Tenant level carrying `name` (case-insensitive).
    fn find_level_by_name(&self, tenant_id: Uuid, name: &str) -> StoreResult<Option<Level>>;

    // -- courses --

    fn course(&self, course_id: Uuid) -> StoreResult<Option<CourseOffering>>;

    /// Offerings bound to `level_id` within the tenant.
    fn courses_for_level(&self, tenant_id: Uuid, level_id: Uuid) -> StoreResult<Vec<CourseOffering>>;

    /// Add `delta` to a course's enrollment counter, saturating at zero.
    /// Returns the new value.
    fn adjust_enrollment_count(&mut self, course_id: Uuid, delta: i32) -> StoreResult<u32>;

    // -- enrollments --

    fn enrollments_for_student(&self, tenant_id: Uuid, student_id: Uuid) -> StoreResult<Vec<Enrollment>>;

    fn insert_enrollment(&mut self, enrollment: Enrollment) -> StoreResult<()>;

    fn delete_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<()>;

    // -- periods --

    /// The tenant's period flagged as current.
    fn current_period(&self, tenant_id: Uuid) -> StoreResult<Option<Period>>;

    fn period(&self, period_id: Uuid) -> StoreResult<Option<Period>>;

    fn periods(&self, tenant_id: Uuid) -> StoreResult<Vec<Period>>;

    // -- audit --

    /// Records of the tenant matching `filter`, in append order.
    fn promotion_records(
        &self,
        tenant_id: Uuid,
        filter: &CorrelationFilter,
    ) -> StoreResult<Vec<PromotionRecord>>;

    /// Append an audit record. Records are never updated afterwards.
    fn append_promotion_record(&mut self, record: PromotionRecord) -> StoreResult<()>;
}

/// Aggregated performance score provider.
pub trait ScoreSource {
    /// Zero or more aggregated rows for a student in a period.
    fn scores(&self, tenant_id: Uuid, student_id: Uuid, period_id: Uuid) -> StoreResult<Vec<ScoreRecord>>;
}

/// Savepoint handle inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(pub(crate) usize);

/// A unit of work. Dropping without `commit` discards every staged write.
pub trait Transaction: SchoolRecords + ScoreSource {
    /// Mark the current staged state so later writes can be undone alone.
    fn savepoint(&mut self) -> Savepoint;

    /// Undo every write made after `savepoint`. The savepoint is consumed.
    fn rollback_to_savepoint(&mut self, savepoint: Savepoint) -> StoreResult<()>;

    /// Keep writes made after `savepoint` and forget it.
    fn release_savepoint(&mut self, savepoint: Savepoint) -> StoreResult<()>;

    fn commit(self) -> StoreResult<()>;

    fn rollback(self);
}

/// Backend able to open transactions.
pub trait Datastore {
    type Tx: Transaction;

    fn begin(&self) -> StoreResult<Self::Tx>;
}
