//! Progression Orchestrator
//!
//! Runs one batch for a tenant: resolve the period and hierarchy, discover
//! students, then evaluate each student in its own savepoint. A failing
//! student is rolled back to its savepoint and recorded; the batch goes on.
//!
//! Run-level failures (no progression period, store errors around
//! savepoints) abort the whole batch.

use chrono::NaiveDate;
use uuid::Uuid;

use super::errors::{ProgressionError, ProgressionErrorKind, ProgressionResult};
use super::executor::PromotionExecutor;
use super::hierarchy::LevelHierarchy;
use super::report::{BatchReport, EntityError, PromotionStatus};
use super::request::{BatchRequest, PromotionRequest};
use crate::config::{ProgressionMode, TenantPolicy};
use crate::model::{Period, ScoreRecord, Student};
use crate::observability::{log_event_with_fields, Event, Logger, ObservationScope, ProgressionMetrics};
use crate::storage::{SchoolRecords, Transaction};

/// How one student ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StudentOutcome {
    Promoted,
    Graduated,
    Retained,
    Unchanged,
}

pub struct ProgressionOrchestrator<'a> {
    policy: &'a TenantPolicy,
    triggered_by: &'a str,
    metrics: &'a ProgressionMetrics,
}

impl<'a> ProgressionOrchestrator<'a> {
    pub fn new(policy: &'a TenantPolicy, triggered_by: &'a str, metrics: &'a ProgressionMetrics) -> Self {
        Self {
            policy,
            triggered_by,
            metrics,
        }
    }

    /// Run a batch inside `tx`. Never commits.
    pub fn run<T>(&self, tx: &mut T, request: &BatchRequest) -> ProgressionResult<BatchReport>
    where
        T: Transaction,
    {
        if let Some(reason) = request.validate_format() {
            return Err(ProgressionError::invalid_request(reason));
        }

        let tenant_id = request.tenant_id;
        let tenant_field = tenant_id.to_string();
        let execution_field = request.correlation.execution_id.to_string();
        let scope = ObservationScope::with_fields(
            "PROMOTION_BATCH",
            &[
                ("tenant_id", tenant_field.as_str()),
                ("execution_id", execution_field.as_str()),
                ("mode", self.policy.mode.as_str()),
            ],
        );

        let mut report = BatchReport::empty(
            request.correlation.execution_id,
            request.correlation.progression_id,
            request.dry_run,
        );

        let as_of = request.correlation.execution_at.date_naive();
        let period = match resolve_progression_period(&*tx, tenant_id, self.policy, as_of) {
            Ok(period) => period,
            Err(e) => {
                self.metrics.increment_batches_aborted();
                scope.fail(&e.to_string());
                return Err(e);
            }
        };
        report.period_id = Some(period.id);

        let hierarchy = LevelHierarchy::resolve(&*tx, tenant_id, &self.policy.terminal_level_name)?;
        if hierarchy.is_empty() {
            self.metrics.increment_batches();
            scope.complete_with_fields(&[("total", "0")]);
            return Ok(report);
        }

        let students = load_students(&*tx, tenant_id, &hierarchy)?;
        report.total_count = students.len();

        for student in &students {
            let savepoint = tx.savepoint();
            match self.process_student(tx, &hierarchy, &period, student, request) {
                Ok(outcome) => {
                    tx.release_savepoint(savepoint)?;
                    self.record_outcome(&mut report, student.id, outcome, request.dry_run);
                }
                Err(e) => {
                    tx.rollback_to_savepoint(savepoint)?;
                    self.metrics.increment_student_failures();
                    let student_field = student.id.to_string();
                    Logger::warn(
                        Event::StudentFailed.as_str(),
                        &[
                            ("student_id", student_field.as_str()),
                            ("code", e.code()),
                            ("reason", e.message.as_str()),
                        ],
                    );
                    report.errors.push(EntityError::from_error(student.id, &e));
                }
            }
        }

        self.metrics.increment_batches();
        let promoted = report.promoted_count.to_string();
        let graduated = report.graduated_count.to_string();
        let retained = report.retained_count.to_string();
        let failed = report.errors.len().to_string();
        scope.complete_with_fields(&[
            ("promoted", promoted.as_str()),
            ("graduated", graduated.as_str()),
            ("retained", retained.as_str()),
            ("failed", failed.as_str()),
        ]);

        Ok(report)
    }

    fn process_student<T>(
        &self,
        tx: &mut T,
        hierarchy: &LevelHierarchy,
        period: &Period,
        student: &Student,
        batch: &BatchRequest,
    ) -> ProgressionResult<StudentOutcome>
    where
        T: Transaction,
    {
        let tenant_id = batch.tenant_id;
        let Some(level_id) = student.current_level_id else {
            return Err(ProgressionError::new(
                ProgressionErrorKind::PerEntityFailure,
                "student has no current level",
            ));
        };

        let level = tx
            .level(level_id)?
            .ok_or_else(|| ProgressionError::level_not_found(level_id))?;
        if hierarchy.is_terminal(&level) {
            return Ok(StudentOutcome::Unchanged);
        }

        if self.policy.mode == ProgressionMode::Threshold {
            let scores = tx.scores(tenant_id, student.id, period.id)?;
            let passed = mean_score(&scores).map_or(false, |mean| self.policy.passes(mean));
            if !passed {
                return Ok(StudentOutcome::Retained);
            }
        }

        let (destination, graduating) = match hierarchy.next_level(&level) {
            Some(next) => (next.id, false),
            None => {
                let terminal = tx
                    .find_level_by_name(tenant_id, &self.policy.terminal_level_name)?
                    .ok_or_else(|| {
                        ProgressionError::configuration(format!(
                            "no terminal level named '{}'",
                            self.policy.terminal_level_name
                        ))
                    })?;
                (terminal.id, true)
            }
        };

        let mut request = PromotionRequest::new(tenant_id, student.id)
            .with_target(destination)
            .with_dry_run(batch.dry_run)
            .with_correlation(batch.correlation);
        request.note = batch.note.clone();

        let report = PromotionExecutor::transition(tx, hierarchy, student, &request, self.triggered_by)?;
        Ok(match report.status {
            PromotionStatus::NoOp | PromotionStatus::Terminal => StudentOutcome::Unchanged,
            PromotionStatus::Applied | PromotionStatus::Previewed if graduating => StudentOutcome::Graduated,
            PromotionStatus::Applied | PromotionStatus::Previewed => StudentOutcome::Promoted,
        })
    }

    fn record_outcome(&self, report: &mut BatchReport, student_id: Uuid, outcome: StudentOutcome, dry_run: bool) {
        let event = match outcome {
            StudentOutcome::Promoted => {
                report.promoted_count += 1;
                self.count_transition(dry_run, || self.metrics.increment_promotions());
                Event::StudentPromoted
            }
            StudentOutcome::Graduated => {
                report.graduated_count += 1;
                self.count_transition(dry_run, || self.metrics.increment_graduations());
                Event::StudentGraduated
            }
            StudentOutcome::Retained => {
                report.retained_count += 1;
                self.metrics.increment_retentions();
                Event::StudentRetained
            }
            StudentOutcome::Unchanged => {
                report.unchanged_count += 1;
                Event::StudentUnchanged
            }
        };

        let student_field = student_id.to_string();
        log_event_with_fields(event, &[("student_id", student_field.as_str())]);
    }

    fn count_transition(&self, dry_run: bool, applied: impl FnOnce()) {
        if dry_run {
            self.metrics.increment_dry_runs();
        } else {
            applied();
            self.metrics.increment_records_written();
        }
    }
}

/// Period a batch is evaluated against: the current period when it closes
/// the cycle, else the latest completed final period.
pub(crate) fn resolve_progression_period<R>(
    records: &R,
    tenant_id: Uuid,
    policy: &TenantPolicy,
    as_of: NaiveDate,
) -> ProgressionResult<Period>
where
    R: SchoolRecords + ?Sized,
{
    let final_position = policy.final_cycle_position;

    if let Some(current) = records.current_period(tenant_id)? {
        if current.cycle_position == final_position {
            return Ok(current);
        }
    }

    records
        .periods(tenant_id)?
        .into_iter()
        .filter(|p| p.cycle_position == final_position && p.is_completed(as_of))
        .max_by_key(|p| (p.end_date.unwrap_or(p.start_date), p.start_date))
        .ok_or_else(|| {
            ProgressionError::configuration(format!(
                "no current or completed period at cycle position {}",
                final_position
            ))
        })
}

/// Students a batch covers.
///
/// Tenant students with a current level; when there are none, students
/// referencing one of the resolved levels regardless of their tenant tag.
/// The two sets are never merged.
pub(crate) fn load_students<R>(
    records: &R,
    tenant_id: Uuid,
    hierarchy: &LevelHierarchy,
) -> ProgressionResult<Vec<Student>>
where
    R: SchoolRecords + ?Sized,
{
    let scoped: Vec<Student> = records
        .students(tenant_id)?
        .into_iter()
        .filter(|s| s.current_level_id.is_some())
        .collect();
    if !scoped.is_empty() {
        return Ok(scoped);
    }
    derived_students(records, tenant_id, hierarchy)
}

/// Degraded discovery: students in the hierarchy's levels, any tenant tag.
pub(crate) fn derived_students<R>(
    records: &R,
    tenant_id: Uuid,
    hierarchy: &LevelHierarchy,
) -> ProgressionResult<Vec<Student>>
where
    R: SchoolRecords + ?Sized,
{
    let derived = records.students_in_levels(&hierarchy.level_ids())?;
    if !derived.is_empty() {
        let tenant = tenant_id.to_string();
        let count = derived.len().to_string();
        log_event_with_fields(
            Event::StudentFallbackUsed,
            &[("tenant_id", tenant.as_str()), ("students", count.as_str())],
        );
    }
    Ok(derived)
}

/// Mean of the usable percentages, or `None` when no score is usable.
pub(crate) fn mean_score(scores: &[ScoreRecord]) -> Option<f64> {
    let usable: Vec<f64> = scores.iter().filter_map(|s| s.usable_percentage()).collect();
    if usable.is_empty() {
        return None;
    }
    Some(usable.iter().sum::<f64>() / usable.len() as f64)
}
