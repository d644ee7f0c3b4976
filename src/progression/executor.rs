//! Promotion Executor
//!
//! Moves one student to a destination level inside the caller's
//! transaction:
//!
//! 1. Load the student (tenant-scoped) and its current level
//! 2. Destination: explicit target, else the rank successor
//! 3. No destination → `Terminal`, nothing written
//! 4. Destination == current → `NoOp`, nothing written
//! 5. Snapshot current enrollments and reconcile against the destination
//! 6. Dry run → `Previewed`, nothing written
//! 7. Write level pointer, enrollment diff, counters and one audit record
//!
//! The executor never commits. Step 7 is all-or-nothing only as far as the
//! surrounding transaction is; batch callers wrap each call in a savepoint.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::errors::{ProgressionError, ProgressionResult};
use super::hierarchy::LevelHierarchy;
use super::reconciler::{EnrollmentReconciler, ReconciliationPlan};
use super::report::{PromotionReport, PromotionStatus};
use super::request::PromotionRequest;
use crate::model::{
    CourseOffering, Enrollment, EnrollmentSnapshot, Level, Period, PromotionRecord, Student,
};
use crate::observability::{log_event_with_fields, Event};
use crate::storage::SchoolRecords;

pub struct PromotionExecutor;

impl PromotionExecutor {
    /// Evaluate and, unless `dry_run`, apply one transition.
    ///
    /// `triggered_by` is the resolved actor; the request's own value is
    /// ignored here so callers decide the default in one place.
    pub fn execute<R>(
        records: &mut R,
        hierarchy: &LevelHierarchy,
        request: &PromotionRequest,
        triggered_by: &str,
    ) -> ProgressionResult<PromotionReport>
    where
        R: SchoolRecords + ?Sized,
    {
        if let Some(reason) = request.validate_format() {
            return Err(ProgressionError::invalid_request(reason));
        }

        let student = records
            .student(request.tenant_id, request.student_id)?
            .ok_or_else(|| ProgressionError::student_not_found(request.student_id))?;

        Self::transition(records, hierarchy, &student, request, triggered_by)
    }

    /// Same as [`execute`](Self::execute) for a student row the caller has
    /// already loaded. Batch runs use this so students discovered through
    /// the legacy fallback are not re-filtered by their tenant tag.
    pub(crate) fn transition<R>(
        records: &mut R,
        hierarchy: &LevelHierarchy,
        student: &Student,
        request: &PromotionRequest,
        triggered_by: &str,
    ) -> ProgressionResult<PromotionReport>
    where
        R: SchoolRecords + ?Sized,
    {
        let tenant_id = request.tenant_id;
        let current = match student.current_level_id {
            Some(level_id) => Some(
                records
                    .level(level_id)?
                    .ok_or_else(|| ProgressionError::level_not_found(level_id))?,
            ),
            None => None,
        };

        let destination = match request.target_level_id {
            Some(target) => Some(Self::load_target(records, hierarchy, tenant_id, target)?),
            None => current
                .as_ref()
                .and_then(|level| hierarchy.next_level(level))
                .cloned(),
        };

        let from_level_id = student.current_level_id;
        let student_field = student.id.to_string();

        let Some(destination) = destination else {
            log_event_with_fields(Event::PromotionTerminal, &[("student_id", student_field.as_str())]);
            return Ok(PromotionReport::unchanged(
                student.id,
                from_level_id,
                None,
                request.dry_run,
                PromotionStatus::Terminal,
            ));
        };

        if from_level_id == Some(destination.id) {
            log_event_with_fields(Event::PromotionNoOp, &[("student_id", student_field.as_str())]);
            return Ok(PromotionReport::unchanged(
                student.id,
                from_level_id,
                Some(destination.id),
                request.dry_run,
                PromotionStatus::NoOp,
            ));
        }

        let previous = records.enrollments_for_student(tenant_id, student.id)?;
        let plan = EnrollmentReconciler::plan(records, tenant_id, &previous, destination.id)?;
        let changes = plan.diff.change_set();

        let mut report = PromotionReport {
            student_id: student.id,
            from_level_id,
            to_level_id: Some(destination.id),
            added_course_ids: changes.added.clone(),
            removed_course_ids: changes.removed.clone(),
            retained_course_ids: changes.retained.clone(),
            dry_run: request.dry_run,
            status: PromotionStatus::Previewed,
            record_id: None,
        };

        let to_field = destination.id.to_string();
        if request.dry_run {
            log_event_with_fields(
                Event::PromotionPreviewed,
                &[("student_id", student_field.as_str()), ("to_level_id", to_field.as_str())],
            );
            return Ok(report);
        }

        let previous_enrollments = snapshot(&previous, &plan.courses);
        Self::apply(records, request, student.id, &destination, &previous, &plan)?;

        let current_enrollments = records.enrollments_for_student(tenant_id, student.id)?;
        let now = Utc::now();
        let record = PromotionRecord {
            id: Uuid::new_v4(),
            tenant_id,
            student_id: student.id,
            from_level_id,
            to_level_id: destination.id,
            triggered_by: triggered_by.to_string(),
            previous_enrollments,
            new_enrollments: snapshot(&current_enrollments, &plan.courses),
            changes,
            note: request.note.clone(),
            execution_id: request.correlation.execution_id,
            progression_id: request.correlation.progression_id,
            execution_at: request.correlation.execution_at,
            created_at: now,
        };
        let record_id = record.id;
        records.append_promotion_record(record)?;

        let execution_field = request.correlation.execution_id.to_string();
        log_event_with_fields(
            Event::PromotionApplied,
            &[
                ("student_id", student_field.as_str()),
                ("to_level_id", to_field.as_str()),
                ("execution_id", execution_field.as_str()),
            ],
        );

        report.status = PromotionStatus::Applied;
        report.record_id = Some(record_id);
        Ok(report)
    }

    /// Explicit targets must exist and belong to the tenant, either by tag
    /// or through the resolved hierarchy.
    fn load_target<R>(
        records: &R,
        hierarchy: &LevelHierarchy,
        tenant_id: Uuid,
        target: Uuid,
    ) -> ProgressionResult<Level>
    where
        R: SchoolRecords + ?Sized,
    {
        let level = records
            .level(target)?
            .ok_or_else(|| ProgressionError::level_not_found(target))?;
        if level.tenant_id != tenant_id && !hierarchy.contains(level.id) {
            return Err(ProgressionError::level_not_found(target));
        }
        Ok(level)
    }

    fn apply<R>(
        records: &mut R,
        request: &PromotionRequest,
        student_id: Uuid,
        destination: &Level,
        previous: &[Enrollment],
        plan: &ReconciliationPlan,
    ) -> ProgressionResult<()>
    where
        R: SchoolRecords + ?Sized,
    {
        let tenant_id = request.tenant_id;
        records.set_student_level(student_id, Some(destination.id))?;

        for enrollment in &plan.diff.to_remove {
            records.delete_enrollment(enrollment.id)?;
            records.adjust_enrollment_count(enrollment.course_offering_id, -1)?;
        }

        if plan.diff.to_add.is_empty() {
            return Ok(());
        }

        let as_of = request.correlation.execution_at.date_naive();
        let Some(period) = resolve_enrollment_period(records, tenant_id, previous, as_of)? else {
            let student_field = student_id.to_string();
            let skipped = plan.diff.to_add.len().to_string();
            log_event_with_fields(
                Event::EnrollmentPeriodUnresolved,
                &[("student_id", student_field.as_str()), ("skipped", skipped.as_str())],
            );
            return Ok(());
        };

        for course in &plan.diff.to_add {
            records.insert_enrollment(Enrollment::active(tenant_id, student_id, course.id, period.id))?;
            records.adjust_enrollment_count(course.id, 1)?;
        }
        Ok(())
    }
}

/// Period for enrollments created by a promotion:
/// current period, else a still-existing period of the pre-removal
/// enrollments, else the most recently started period.
pub(crate) fn resolve_enrollment_period<R>(
    records: &R,
    tenant_id: Uuid,
    previous: &[Enrollment],
    as_of: NaiveDate,
) -> ProgressionResult<Option<Period>>
where
    R: SchoolRecords + ?Sized,
{
    if let Some(period) = records.current_period(tenant_id)? {
        return Ok(Some(period));
    }

    for enrollment in previous {
        if let Some(period) = records.period(enrollment.period_id)? {
            return Ok(Some(period));
        }
    }

    Ok(records
        .periods(tenant_id)?
        .into_iter()
        .filter(|p| p.start_date <= as_of)
        .max_by_key(|p| p.start_date))
}

fn snapshot(enrollments: &[Enrollment], courses: &HashMap<Uuid, CourseOffering>) -> Vec<EnrollmentSnapshot> {
    enrollments
        .iter()
        .map(|e| EnrollmentSnapshot::capture(e, courses.get(&e.course_offering_id)))
        .collect()
}
