//! Staged-copy transaction shared by the bundled stores.
//!
//! `begin` clones the committed dataset; every read and write goes to the
//! staged copy. `commit` publishes the copy only if nobody else committed in
//! between (revision check). Savepoints copy the tables and remember the
//! length of the append-only logs (scores, promotion records), so the audit
//! log is never copied per student.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::dataset::Dataset;
use super::errors::{StoreError, StoreResult};
use super::file;
use super::traits::{Savepoint, SchoolRecords, ScoreSource, Transaction};
use crate::model::{
    CorrelationFilter, CourseOffering, Enrollment, Level, Period, PromotionRecord, ScoreRecord,
    Student,
};
use crate::observability::{Event, Logger};

/// Where a committed dataset goes.
#[derive(Debug, Clone)]
pub(crate) enum CommitTarget {
    Memory(Arc<Mutex<Dataset>>),
    File(PathBuf),
}

/// Transaction over a staged copy of a [`Dataset`].
#[derive(Debug)]
pub struct DatasetTransaction {
    staged: Dataset,
    base_revision: u64,
    savepoints: Vec<SavepointState>,
    target: CommitTarget,
}

/// Staged state captured by a savepoint.
#[derive(Debug)]
struct SavepointState {
    tables: Dataset,
    scores_len: usize,
    records_len: usize,
}

impl SavepointState {
    fn capture(staged: &Dataset) -> Self {
        Self {
            tables: Dataset {
                revision: staged.revision,
                students: staged.students.clone(),
                levels: staged.levels.clone(),
                courses: staged.courses.clone(),
                enrollments: staged.enrollments.clone(),
                periods: staged.periods.clone(),
                scores: Vec::new(),
                promotion_records: Vec::new(),
            },
            scores_len: staged.scores.len(),
            records_len: staged.promotion_records.len(),
        }
    }

    fn restore(self, staged: &mut Dataset) {
        let mut scores = std::mem::take(&mut staged.scores);
        scores.truncate(self.scores_len);
        let mut promotion_records = std::mem::take(&mut staged.promotion_records);
        promotion_records.truncate(self.records_len);
        *staged = Dataset {
            scores,
            promotion_records,
            ..self.tables
        };
    }
}

impl DatasetTransaction {
    pub(crate) fn new(committed: Dataset, target: CommitTarget) -> Self {
        Self {
            base_revision: committed.revision,
            staged: committed,
            savepoints: Vec::new(),
            target,
        }
    }

    /// Read-only view of the staged state.
    pub fn staged(&self) -> &Dataset {
        &self.staged
    }

    /// Mutable access to the staged state, for callers composing their own
    /// writes with the engine inside one unit of work. Scores and promotion
    /// records must only be appended: savepoints restore them by length.
    pub fn staged_mut(&mut self) -> &mut Dataset {
        &mut self.staged
    }

    fn check_savepoint(&self, savepoint: Savepoint) -> StoreResult<()> {
        if savepoint.0 >= self.savepoints.len() {
            return Err(StoreError::InvalidSavepoint(savepoint.0));
        }
        Ok(())
    }
}

impl SchoolRecords for DatasetTransaction {
    fn student(&self, tenant_id: Uuid, student_id: Uuid) -> StoreResult<Option<Student>> {
        Ok(self
            .staged
            .students
            .get(&student_id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned())
    }

    fn students(&self, tenant_id: Uuid) -> StoreResult<Vec<Student>> {
        Ok(self
            .staged
            .students
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn students_in_levels(&self, level_ids: &[Uuid]) -> StoreResult<Vec<Student>> {
        Ok(self
            .staged
            .students
            .values()
            .filter(|s| s.current_level_id.map_or(false, |l| level_ids.contains(&l)))
            .cloned()
            .collect())
    }

    fn set_student_level(&mut self, student_id: Uuid, level_id: Option<Uuid>) -> StoreResult<()> {
        if let Some(level_id) = level_id {
            if !self.staged.levels.contains_key(&level_id) {
                return Err(StoreError::constraint(
                    "students",
                    format!("current_level_id references missing level {}", level_id),
                ));
            }
        }
        let student = self
            .staged
            .students
            .get_mut(&student_id)
            .ok_or_else(|| StoreError::not_found("students", student_id))?;
        student.current_level_id = level_id;
        Ok(())
    }

    fn level(&self, level_id: Uuid) -> StoreResult<Option<Level>> {
        Ok(self.staged.levels.get(&level_id).cloned())
    }

    fn levels(&self, tenant_id: Uuid) -> StoreResult<Vec<Level>> {
        Ok(self
            .staged
            .levels
            .values()
            .filter(|l| l.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn levels_referenced_by_students(&self, tenant_id: Uuid) -> StoreResult<Vec<Level>> {
        let mut seen = std::collections::BTreeSet::new();
        let mut levels = Vec::new();
        for student in self.staged.students.values() {
            if student.tenant_id != tenant_id {
                continue;
            }
            let Some(level_id) = student.current_level_id else {
                continue;
            };
            if !seen.insert(level_id) {
                continue;
            }
            if let Some(level) = self.staged.levels.get(&level_id) {
                levels.push(level.clone());
            }
        }
        Ok(levels)
    }

    fn find_level_by_name(&self, tenant_id: Uuid, name: &str) -> StoreResult<Option<Level>> {
        Ok(self
            .staged
            .levels
            .values()
            .find(|l| l.tenant_id == tenant_id && l.is_terminal(name))
            .cloned())
    }

    fn course(&self, course_id: Uuid) -> StoreResult<Option<CourseOffering>> {
        Ok(self.staged.courses.get(&course_id).cloned())
    }

    fn courses_for_level(&self, tenant_id: Uuid, level_id: Uuid) -> StoreResult<Vec<CourseOffering>> {
        Ok(self
            .staged
            .courses
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.level_id == Some(level_id))
            .cloned()
            .collect())
    }

    fn adjust_enrollment_count(&mut self, course_id: Uuid, delta: i32) -> StoreResult<u32> {
        let course = self
            .staged
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| StoreError::not_found("course_offerings", course_id))?;
        course.enrollment_count = if delta < 0 {
            course.enrollment_count.saturating_sub(delta.unsigned_abs())
        } else {
            course.enrollment_count.saturating_add(delta as u32)
        };
        Ok(course.enrollment_count)
    }

    fn enrollments_for_student(&self, tenant_id: Uuid, student_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .staged
            .enrollments
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.student_id == student_id)
            .cloned()
            .collect())
    }

    fn insert_enrollment(&mut self, enrollment: Enrollment) -> StoreResult<()> {
        if !self.staged.periods.contains_key(&enrollment.period_id) {
            return Err(StoreError::constraint(
                "enrollments",
                format!("period_id references missing period {}", enrollment.period_id),
            ));
        }
        if !self.staged.courses.contains_key(&enrollment.course_offering_id) {
            return Err(StoreError::constraint(
                "enrollments",
                format!(
                    "course_offering_id references missing course {}",
                    enrollment.course_offering_id
                ),
            ));
        }
        let duplicate = self.staged.enrollments.values().any(|e| {
            e.student_id == enrollment.student_id
                && e.course_offering_id == enrollment.course_offering_id
        });
        if duplicate {
            return Err(StoreError::constraint(
                "enrollments",
                "student already enrolled in course",
            ));
        }
        self.staged.enrollments.insert(enrollment.id, enrollment);
        Ok(())
    }

    fn delete_enrollment(&mut self, enrollment_id: Uuid) -> StoreResult<()> {
        self.staged
            .enrollments
            .remove(&enrollment_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("enrollments", enrollment_id))
    }

    fn current_period(&self, tenant_id: Uuid) -> StoreResult<Option<Period>> {
        Ok(self
            .staged
            .periods
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.is_current)
            .max_by_key(|p| p.start_date)
            .cloned())
    }

    fn period(&self, period_id: Uuid) -> StoreResult<Option<Period>> {
        Ok(self.staged.periods.get(&period_id).cloned())
    }

    fn periods(&self, tenant_id: Uuid) -> StoreResult<Vec<Period>> {
        Ok(self
            .staged
            .periods
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn promotion_records(
        &self,
        tenant_id: Uuid,
        filter: &CorrelationFilter,
    ) -> StoreResult<Vec<PromotionRecord>> {
        Ok(self
            .staged
            .promotion_records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && filter.matches(r))
            .cloned()
            .collect())
    }

    fn append_promotion_record(&mut self, record: PromotionRecord) -> StoreResult<()> {
        if self.staged.promotion_records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::constraint(
                "promotion_records",
                format!("record {} already written", record.id),
            ));
        }
        self.staged.promotion_records.push(record);
        Ok(())
    }
}

impl ScoreSource for DatasetTransaction {
    fn scores(&self, tenant_id: Uuid, student_id: Uuid, period_id: Uuid) -> StoreResult<Vec<ScoreRecord>> {
        Ok(self
            .staged
            .scores
            .iter()
            .filter(|s| {
                s.tenant_id == tenant_id && s.student_id == student_id && s.period_id == period_id
            })
            .cloned()
            .collect())
    }
}

impl Transaction for DatasetTransaction {
    fn savepoint(&mut self) -> Savepoint {
        self.savepoints.push(SavepointState::capture(&self.staged));
        Savepoint(self.savepoints.len() - 1)
    }

    fn rollback_to_savepoint(&mut self, savepoint: Savepoint) -> StoreResult<()> {
        self.check_savepoint(savepoint)?;
        self.savepoints.truncate(savepoint.0 + 1);
        if let Some(state) = self.savepoints.pop() {
            state.restore(&mut self.staged);
        }
        Ok(())
    }

    fn release_savepoint(&mut self, savepoint: Savepoint) -> StoreResult<()> {
        self.check_savepoint(savepoint)?;
        self.savepoints.truncate(savepoint.0);
        Ok(())
    }

    fn commit(mut self) -> StoreResult<()> {
        let next_revision = self.base_revision + 1;
        self.staged.revision = next_revision;

        match &self.target {
            CommitTarget::Memory(shared) => {
                let mut committed = shared.lock().map_err(|_| StoreError::Poisoned)?;
                if committed.revision != self.base_revision {
                    return Err(StoreError::Conflict {
                        base: self.base_revision,
                        found: committed.revision,
                    });
                }
                *committed = self.staged;
            }
            CommitTarget::File(path) => {
                let on_disk = file::read_dataset(path)?;
                if on_disk.revision != self.base_revision {
                    return Err(StoreError::Conflict {
                        base: self.base_revision,
                        found: on_disk.revision,
                    });
                }
                file::write_dataset(path, &self.staged)?;
            }
        }

        let revision = next_revision.to_string();
        Logger::trace(Event::StoreCommit.as_str(), &[("revision", revision.as_str())]);
        Ok(())
    }

    fn rollback(self) {
        let revision = self.base_revision.to_string();
        Logger::trace(Event::StoreRollback.as_str(), &[("revision", revision.as_str())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn memory_tx(data: Dataset) -> (Arc<Mutex<Dataset>>, DatasetTransaction) {
        let shared = Arc::new(Mutex::new(data.clone()));
        let tx = DatasetTransaction::new(data, CommitTarget::Memory(Arc::clone(&shared)));
        (shared, tx)
    }

    #[test]
    fn test_savepoint_rollback_discards_later_writes() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let level = data.insert_level(Level::new(tenant, 1, "Grade 1"));
        let student = data.insert_student(Student::new(tenant, "Ada", None));
        let (_shared, mut tx) = memory_tx(data);

        let sp = tx.savepoint();
        tx.set_student_level(student, Some(level)).unwrap();
        tx.rollback_to_savepoint(sp).unwrap();

        let loaded = tx.student(tenant, student).unwrap().unwrap();
        assert!(loaded.current_level_id.is_none());

        // Consumed savepoint cannot be reused.
        assert!(tx.rollback_to_savepoint(sp).is_err());
    }

    #[test]
    fn test_savepoint_rollback_truncates_audit_log() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let g1 = data.insert_level(Level::new(tenant, 1, "Grade 1"));
        let g2 = data.insert_level(Level::new(tenant, 2, "Grade 2"));
        let student = data.insert_student(Student::new(tenant, "Ada", Some(g1)));
        let (_shared, mut tx) = memory_tx(data);

        let record = |to: Uuid| PromotionRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            student_id: student,
            from_level_id: Some(g1),
            to_level_id: to,
            triggered_by: "system".to_string(),
            previous_enrollments: Vec::new(),
            new_enrollments: Vec::new(),
            changes: Default::default(),
            note: None,
            execution_id: Uuid::new_v4(),
            progression_id: None,
            execution_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };

        tx.append_promotion_record(record(g2)).unwrap();
        let sp = tx.savepoint();
        tx.set_student_level(student, Some(g2)).unwrap();
        tx.append_promotion_record(record(g2)).unwrap();
        tx.rollback_to_savepoint(sp).unwrap();

        assert_eq!(tx.staged().promotion_records.len(), 1);
        assert_eq!(tx.staged().students[&student].current_level_id, Some(g1));
        assert_eq!(tx.staged().levels.len(), 2);
    }

    #[test]
    fn test_release_keeps_writes() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let level = data.insert_level(Level::new(tenant, 1, "Grade 1"));
        let student = data.insert_student(Student::new(tenant, "Ada", None));
        let (_shared, mut tx) = memory_tx(data);

        let sp = tx.savepoint();
        tx.set_student_level(student, Some(level)).unwrap();
        tx.release_savepoint(sp).unwrap();

        let loaded = tx.student(tenant, student).unwrap().unwrap();
        assert_eq!(loaded.current_level_id, Some(level));
    }

    #[test]
    fn test_commit_conflict_detected() {
        let (shared, tx) = memory_tx(Dataset::new());
        shared.lock().unwrap().revision = 5;

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, StoreError::Conflict { base: 0, found: 5 }));
    }

    #[test]
    fn test_commit_publishes_and_bumps_revision() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let level = data.insert_level(Level::new(tenant, 1, "Grade 1"));
        let student = data.insert_student(Student::new(tenant, "Ada", None));
        let (shared, mut tx) = memory_tx(data);

        tx.set_student_level(student, Some(level)).unwrap();
        tx.commit().unwrap();

        let committed = shared.lock().unwrap();
        assert_eq!(committed.revision, 1);
        assert_eq!(committed.students[&student].current_level_id, Some(level));
    }

    #[test]
    fn test_tenant_scoping() {
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut data = Dataset::new();
        let student = data.insert_student(Student::new(other, "Eve", None));
        let (_shared, tx) = memory_tx(data);

        assert!(tx.student(tenant, student).unwrap().is_none());
        assert!(tx.students(tenant).unwrap().is_empty());
        assert_eq!(tx.students(other).unwrap().len(), 1);
    }

    #[test]
    fn test_enrollment_constraints() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let course = data.insert_course(CourseOffering::new(tenant, "BIO", None));
        let period = data.insert_period(Period::new(
            tenant,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            1,
        ));
        let student = data.insert_student(Student::new(tenant, "Ada", None));
        let (_shared, mut tx) = memory_tx(data);

        tx.insert_enrollment(Enrollment::active(tenant, student, course, period))
            .unwrap();
        let dup = tx.insert_enrollment(Enrollment::active(tenant, student, course, period));
        assert!(matches!(dup, Err(StoreError::Constraint { .. })));

        let missing_period =
            tx.insert_enrollment(Enrollment::active(tenant, student, Uuid::new_v4(), Uuid::new_v4()));
        assert!(missing_period.is_err());
    }

    #[test]
    fn test_counter_saturates_at_zero() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let course = data.insert_course(CourseOffering::new(tenant, "BIO", None));
        let (_shared, mut tx) = memory_tx(data);

        assert_eq!(tx.adjust_enrollment_count(course, -1).unwrap(), 0);
        assert_eq!(tx.adjust_enrollment_count(course, 2).unwrap(), 2);
        assert_eq!(tx.adjust_enrollment_count(course, -1).unwrap(), 1);
    }

    #[test]
    fn test_audit_record_ids_are_unique() {
        use crate::model::ChangeSet;
        use chrono::Utc;

        let (_shared, mut tx) = memory_tx(Dataset::new());
        let record = PromotionRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            from_level_id: None,
            to_level_id: Uuid::new_v4(),
            triggered_by: "test".into(),
            previous_enrollments: Vec::new(),
            new_enrollments: Vec::new(),
            changes: ChangeSet::default(),
            note: None,
            execution_id: Uuid::new_v4(),
            progression_id: None,
            execution_at: Utc::now(),
            created_at: Utc::now(),
        };

        tx.append_promotion_record(record.clone()).unwrap();
        assert!(tx.append_promotion_record(record).is_err());
    }
}
