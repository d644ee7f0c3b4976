//! Revert Coordinator
//!
//! Undoes a run by correlation id. Only the most recently created matching
//! record per student is applied; its `from_level_id` becomes the student's
//! level again. Audit records themselves are left untouched.
//!
//! With `RevertScope::LevelAndEnrollments` the recorded enrollment diff is
//! also replayed backwards: enrollments the run added are dropped and the
//! ones it removed are re-created from the snapshots.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::errors::{ProgressionError, ProgressionErrorKind, ProgressionResult};
use super::report::{EntityError, RevertReport};
use super::request::{RevertRequest, RevertScope};
use crate::model::{Enrollment, PromotionRecord};
use crate::observability::{log_event_with_fields, Event, Logger, ObservationScope, ProgressionMetrics};
use crate::storage::{SchoolRecords, Transaction};

pub struct RevertCoordinator<'a> {
    metrics: &'a ProgressionMetrics,
}

impl<'a> RevertCoordinator<'a> {
    pub fn new(metrics: &'a ProgressionMetrics) -> Self {
        Self { metrics }
    }

    /// Revert inside `tx`. Never commits.
    pub fn run<T>(&self, tx: &mut T, request: &RevertRequest) -> ProgressionResult<RevertReport>
    where
        T: Transaction,
    {
        if let Some(reason) = request.validate_format() {
            return Err(ProgressionError::invalid_request(reason));
        }

        let tenant_field = request.tenant_id.to_string();
        let scope = ObservationScope::with_fields("PROMOTION_REVERT", &[("tenant_id", tenant_field.as_str())]);

        let matched = tx.promotion_records(request.tenant_id, &request.filter)?;
        let mut report = RevertReport {
            matched_records: matched.len(),
            ..RevertReport::default()
        };

        if matched.is_empty() {
            log_event_with_fields(Event::RevertNoMatch, &[("tenant_id", tenant_field.as_str())]);
            scope.complete_with_fields(&[("reverted", "0")]);
            return Ok(report);
        }

        for record in latest_per_student(matched) {
            let savepoint = tx.savepoint();
            match revert_record(tx, &record, request.scope) {
                Ok(()) => {
                    tx.release_savepoint(savepoint)?;
                    report.reverted_count += 1;
                }
                Err(e) => {
                    tx.rollback_to_savepoint(savepoint)?;
                    let student_field = record.student_id.to_string();
                    Logger::warn(
                        Event::RevertSkipped.as_str(),
                        &[
                            ("student_id", student_field.as_str()),
                            ("code", e.code()),
                            ("reason", e.message.as_str()),
                        ],
                    );
                    report.errors.push(EntityError::from_error(record.student_id, &e));
                }
            }
        }

        self.metrics.add_reverts(report.reverted_count as u64);
        let reverted = report.reverted_count.to_string();
        let failed = report.errors.len().to_string();
        scope.complete_with_fields(&[("reverted", reverted.as_str()), ("failed", failed.as_str())]);
        Ok(report)
    }
}

/// Newest record per student, by `created_at` and then append order, in
/// the order those records were appended.
fn latest_per_student(records: Vec<PromotionRecord>) -> Vec<PromotionRecord> {
    let mut latest: HashMap<Uuid, (DateTime<Utc>, usize)> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let key = (record.created_at, idx);
        latest
            .entry(record.student_id)
            .and_modify(|current| {
                if key >= *current {
                    *current = key;
                }
            })
            .or_insert(key);
    }

    records
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| latest.get(&record.student_id).map(|(_, i)| i) == Some(idx))
        .map(|(_, record)| record)
        .collect()
}

fn revert_record<R>(records: &mut R, record: &PromotionRecord, scope: RevertScope) -> ProgressionResult<()>
where
    R: SchoolRecords + ?Sized,
{
    let Some(from_level_id) = record.from_level_id else {
        return Err(ProgressionError::new(
            ProgressionErrorKind::PerEntityFailure,
            format!("record {} has no previous level to restore", record.id),
        ));
    };

    records.set_student_level(record.student_id, Some(from_level_id))?;

    if scope == RevertScope::LevelAndEnrollments {
        replay_enrollments(records, record)?;
    }

    let student_field = record.student_id.to_string();
    let level_field = from_level_id.to_string();
    log_event_with_fields(
        Event::RevertApplied,
        &[("student_id", student_field.as_str()), ("level_id", level_field.as_str())],
    );
    Ok(())
}

fn replay_enrollments<R>(records: &mut R, record: &PromotionRecord) -> ProgressionResult<()>
where
    R: SchoolRecords + ?Sized,
{
    let current = records.enrollments_for_student(record.tenant_id, record.student_id)?;

    for enrollment in &current {
        if record.changes.added.contains(&enrollment.course_offering_id) {
            records.delete_enrollment(enrollment.id)?;
            records.adjust_enrollment_count(enrollment.course_offering_id, -1)?;
        }
    }

    for snapshot in &record.previous_enrollments {
        if !record.changes.removed.contains(&snapshot.course_offering_id) {
            continue;
        }
        let enrolled = current
            .iter()
            .any(|e| e.course_offering_id == snapshot.course_offering_id);
        if enrolled {
            continue;
        }
        records.insert_enrollment(Enrollment {
            id: snapshot.enrollment_id,
            tenant_id: record.tenant_id,
            student_id: record.student_id,
            course_offering_id: snapshot.course_offering_id,
            period_id: snapshot.period_id,
            status: snapshot.status,
        })?;
        records.adjust_enrollment_count(snapshot.course_offering_id, 1)?;
    }

    Ok(())
}
