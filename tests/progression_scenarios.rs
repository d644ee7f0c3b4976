//! End-to-end progression scenarios
//!
//! Every test seeds a fresh in-memory school, drives the public engine API
//! and checks the committed dataset.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use uuid::Uuid;

use progression::model::{CourseOffering, Enrollment, Level, Period, ScoreRecord, Student};
use progression::progression::{
    BatchRequest, EnrollmentReconciler, PreviewAction, ProgressionEngine, ProgressionErrorKind,
    PromotionRequest, PromotionStatus, RevertRequest, RevertScope, RunCorrelation,
};
use progression::storage::{Dataset, Datastore, MemoryStore, SchoolRecords, Transaction};
use progression::TenantPolicy;

struct School {
    tenant: Uuid,
    period: Uuid,
    data: Dataset,
}

impl School {
    fn new() -> Self {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let mut period = Period::new(tenant, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), 3);
        period.is_current = true;
        let period = data.insert_period(period);
        Self {
            tenant,
            period,
            data,
        }
    }

    fn level(&mut self, rank: i32, name: &str) -> Uuid {
        self.data.insert_level(Level::new(self.tenant, rank, name))
    }

    fn course(&mut self, code: &str, level: Option<Uuid>) -> Uuid {
        self.data.insert_course(CourseOffering::new(self.tenant, code, level))
    }

    fn student(&mut self, name: &str, level: Option<Uuid>) -> Uuid {
        self.data.insert_student(Student::new(self.tenant, name, level))
    }

    fn enroll(&mut self, student: Uuid, course: Uuid) {
        self.data
            .enroll(Enrollment::active(self.tenant, student, course, self.period));
    }

    fn score(&mut self, student: Uuid, percentage: f64) {
        self.data.insert_score(ScoreRecord {
            tenant_id: self.tenant,
            student_id: student,
            period_id: self.period,
            percentage: Some(percentage),
        });
    }

    fn engine(&self, policy: TenantPolicy) -> ProgressionEngine<MemoryStore, TenantPolicy> {
        ProgressionEngine::new(MemoryStore::from_dataset(self.data.clone()), policy)
    }
}

fn committed(engine: &ProgressionEngine<MemoryStore, TenantPolicy>) -> Dataset {
    engine.store().snapshot().unwrap()
}

// =============================================================================
// SINGLE-STUDENT PROMOTION
// =============================================================================

#[test]
fn test_promote_one_swaps_level_courses_and_keeps_electives() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let course_a = school.course("A", Some(grade1));
    let course_z = school.course("Z", None);
    let course_b = school.course("B", Some(grade2));
    let student = school.student("E", Some(grade1));
    school.enroll(student, course_a);
    school.enroll(student, course_z);

    let engine = school.engine(TenantPolicy::default());
    let report = engine
        .promote_one(&PromotionRequest::new(school.tenant, student), None)
        .unwrap();

    assert_eq!(report.status, PromotionStatus::Applied);
    assert_eq!(report.to_level_id, Some(grade2));
    assert_eq!(report.removed_course_ids, BTreeSet::from([course_a]));
    assert_eq!(report.added_course_ids, BTreeSet::from([course_b]));
    assert_eq!(report.retained_course_ids, BTreeSet::from([course_z]));

    let data = committed(&engine);
    assert_eq!(data.students[&student].current_level_id, Some(grade2));
    assert_eq!(data.courses[&course_a].enrollment_count, 0);
    assert_eq!(data.courses[&course_b].enrollment_count, 1);
    assert_eq!(data.courses[&course_z].enrollment_count, 1);
    assert_eq!(data.promotion_records.len(), 1);

    // Nothing bound to the destination was removed.
    for removed in &report.removed_course_ids {
        assert_ne!(data.courses[removed].level_id, Some(grade2));
    }
}

#[test]
fn test_promote_one_to_current_level_changes_nothing() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    school.level(2, "Grade 2");
    let student = school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let request = PromotionRequest::new(school.tenant, student).with_target(grade1);
    let report = engine.promote_one(&request, None).unwrap();

    assert_eq!(report.status, PromotionStatus::NoOp);
    let data = committed(&engine);
    assert!(data.promotion_records.is_empty());
    assert_eq!(data.students, school.data.students);
}

#[test]
fn test_promote_one_unknown_target_is_not_found() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let student = school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let request = PromotionRequest::new(school.tenant, student).with_target(Uuid::new_v4());
    let err = engine.promote_one(&request, None).unwrap_err();

    assert_eq!(err.kind, ProgressionErrorKind::NotFound);
    assert_eq!(committed(&engine), school.data);
}

// =============================================================================
// BATCH: GRADUATION AND ISOLATION
// =============================================================================

#[test]
fn test_batch_graduates_highest_rank() {
    let mut school = School::new();
    school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let graduated = school.level(100, "Graduated");
    let student = school.student("E", Some(grade2));

    let engine = school.engine(TenantPolicy::default());
    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();

    assert_eq!(report.graduated_count, 1);
    assert_eq!(report.promoted_count, 0);
    assert_eq!(
        committed(&engine).students[&student].current_level_id,
        Some(graduated)
    );
}

#[test]
fn test_batch_without_terminal_level_records_error() {
    let mut school = School::new();
    school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let student = school.student("E", Some(grade2));

    let engine = school.engine(TenantPolicy::default());
    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();

    assert_eq!(report.graduated_count, 0);
    assert_eq!(report.promoted_count, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].student_id, student);
    assert_eq!(report.errors[0].kind, ProgressionErrorKind::Configuration);
    assert_eq!(committed(&engine).students, school.data.students);
}

#[test]
fn test_batch_counts_always_add_up() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let grade3 = school.level(3, "Grade 3");
    let graduated = school.level(4, "Graduated");
    school.course("G2-CORE", Some(grade2));

    school.student("A", Some(grade1));
    school.student("B", Some(grade1));
    school.student("C", Some(grade2));
    school.student("D", Some(grade3));
    school.student("E", Some(graduated));
    school.student("Dangling", Some(Uuid::new_v4()));

    let engine = school.engine(TenantPolicy::default());
    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();

    assert_eq!(report.total_count, 6);
    assert_eq!(report.promoted_count, 3);
    assert_eq!(report.graduated_count, 1);
    assert_eq!(report.unchanged_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors.len()
            + report.promoted_count
            + report.graduated_count
            + report.retained_count
            + report.unchanged_count,
        report.total_count
    );
    assert_eq!(committed(&engine).promotion_records.len(), 4);
}

#[test]
fn test_batch_rejects_period_mid_cycle() {
    let mut school = School::new();
    school.data.periods.get_mut(&school.period).unwrap().cycle_position = 2;
    let grade1 = school.level(1, "Grade 1");
    school.level(2, "Grade 2");
    school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let err = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap_err();

    assert_eq!(err.kind, ProgressionErrorKind::Configuration);
    assert_eq!(committed(&engine), school.data);
}

// =============================================================================
// THRESHOLD MODE
// =============================================================================

#[test]
fn test_threshold_below_pass_mark_is_retained() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    school.level(2, "Grade 2");
    let student = school.student("E", Some(grade1));
    school.score(student, 45.0);

    let engine = school.engine(TenantPolicy::threshold(50.0));
    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();

    assert_eq!(report.retained_count, 1);
    assert!(report.errors.is_empty());
    let data = committed(&engine);
    assert!(data.promotion_records.is_empty());
    assert_eq!(data.students[&student].current_level_id, Some(grade1));
}

#[test]
fn test_threshold_at_pass_mark_is_promoted() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let student = school.student("E", Some(grade1));
    school.score(student, 50.0);

    let engine = school.engine(TenantPolicy::threshold(50.0));
    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();

    assert_eq!(report.promoted_count, 1);
    assert_eq!(
        committed(&engine).students[&student].current_level_id,
        Some(grade2)
    );
}

// =============================================================================
// REVERT
// =============================================================================

#[test]
fn test_revert_applies_newest_record_per_student() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    school.level(3, "Grade 3");
    let student = school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let correlation = RunCorrelation::new();
    for _ in 0..2 {
        let request = PromotionRequest::new(school.tenant, student).with_correlation(correlation);
        engine.promote_one(&request, None).unwrap();
    }
    assert_eq!(committed(&engine).promotion_records.len(), 2);

    let report = engine
        .revert_batch(&RevertRequest::by_execution(school.tenant, correlation.execution_id), None)
        .unwrap();

    assert_eq!(report.matched_records, 2);
    assert_eq!(report.reverted_count, 1);
    assert_eq!(
        committed(&engine).students[&student].current_level_id,
        Some(grade2)
    );
}

#[test]
fn test_revert_without_match_is_noop() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let report = engine
        .revert_batch(&RevertRequest::by_execution(school.tenant, Uuid::new_v4()), None)
        .unwrap();

    assert_eq!(report.reverted_count, 0);
    assert!(report.errors.is_empty());
    assert_eq!(committed(&engine).students, school.data.students);
}

#[test]
fn test_revert_by_progression_with_enrollments() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let course_a = school.course("A", Some(grade1));
    let course_b = school.course("B", Some(grade2));
    let student = school.student("E", Some(grade1));
    school.enroll(student, course_a);

    let engine = school.engine(TenantPolicy::default());
    let progression_id = Uuid::new_v4();
    let request = BatchRequest::new(school.tenant)
        .with_correlation(RunCorrelation::new().with_progression_id(progression_id));
    engine.promote_batch(&request, None).unwrap();

    let revert = RevertRequest::new(
        school.tenant,
        progression::model::CorrelationFilter::by_progression(progression_id),
    )
    .with_scope(RevertScope::LevelAndEnrollments);
    let report = engine.revert_batch(&revert, None).unwrap();
    assert_eq!(report.reverted_count, 1);

    let data = committed(&engine);
    assert_eq!(data.students[&student].current_level_id, Some(grade1));
    assert_eq!(data.course_ids_for_student(student), vec![course_a]);
    assert_eq!(data.courses[&course_a].enrollment_count, 1);
    assert_eq!(data.courses[&course_b].enrollment_count, 0);
}

// =============================================================================
// TRANSACTIONS, PREVIEW, IDEMPOTENCE
// =============================================================================

#[test]
fn test_caller_transaction_spans_several_operations() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let a = school.student("A", Some(grade1));
    let b = school.student("B", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    let mut tx = engine.store().begin().unwrap();
    engine
        .promote_one(&PromotionRequest::new(school.tenant, a), Some(&mut tx))
        .unwrap();
    engine
        .promote_one(&PromotionRequest::new(school.tenant, b), Some(&mut tx))
        .unwrap();

    // Dropping the caller's transaction discards both promotions.
    tx.rollback();
    assert_eq!(committed(&engine), school.data);

    let mut tx = engine.store().begin().unwrap();
    engine
        .promote_one(&PromotionRequest::new(school.tenant, a), Some(&mut tx))
        .unwrap();
    tx.commit().unwrap();
    assert_eq!(committed(&engine).students[&a].current_level_id, Some(grade2));
    assert_eq!(committed(&engine).students[&b].current_level_id, Some(grade1));
}

#[test]
fn test_preview_matches_batch_classification() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    let graduated = school.level(3, "Graduated");
    let a = school.student("A", Some(grade1));
    let b = school.student("B", Some(grade2));
    let done = school.student("Done", Some(graduated));

    let engine = school.engine(TenantPolicy::default());
    let preview = engine.preview_batch(school.tenant, None).unwrap();
    assert_eq!(preview.promote_count, 1);
    assert_eq!(preview.graduate_count, 1);
    assert_eq!(preview.unchanged_count, 1);

    let row_done = preview.rows.iter().find(|r| r.student_id == done).unwrap();
    assert_eq!(row_done.action, PreviewAction::Unchanged);

    let row_b = preview.rows.iter().find(|r| r.student_id == b).unwrap();
    assert_eq!(row_b.action, PreviewAction::Graduate);
    assert_eq!(row_b.to_level_id, Some(graduated));
    assert_eq!(committed(&engine), school.data);

    let report = engine
        .promote_batch(&BatchRequest::new(school.tenant), None)
        .unwrap();
    assert_eq!(report.promoted_count, preview.promote_count);
    assert_eq!(report.graduated_count, preview.graduate_count);
    assert_eq!(report.unchanged_count, preview.unchanged_count);
    assert_eq!(report.total_count, preview.total_count());
    assert_eq!(committed(&engine).students[&a].current_level_id, Some(grade2));
}

#[test]
fn test_reconciled_student_needs_no_changes() {
    let mut school = School::new();
    let grade1 = school.level(1, "Grade 1");
    let grade2 = school.level(2, "Grade 2");
    school.course("A", Some(grade1));
    school.course("B", Some(grade2));
    let student = school.student("E", Some(grade1));

    let engine = school.engine(TenantPolicy::default());
    engine
        .promote_one(&PromotionRequest::new(school.tenant, student), None)
        .unwrap();

    let tx = engine.store().begin().unwrap();
    let current = tx.enrollments_for_student(school.tenant, student).unwrap();
    let plan = EnrollmentReconciler::plan(&tx, school.tenant, &current, grade2).unwrap();
    assert!(plan.diff.is_settled());
    assert_eq!(plan.diff.retained.len(), current.len());
}

#[test]
fn test_scoped_levels_missing_falls_back_to_student_references() {
    let mut school = School::new();
    // Levels tagged with another tenant, referenced by this tenant's students.
    let legacy_tenant = Uuid::new_v4();
    let grade1 = school.data.insert_level(Level::new(legacy_tenant, 1, "Grade 1"));
    let grade2 = school.data.insert_level(Level::new(legacy_tenant, 2, "Grade 2"));
    let a = school.student("A", Some(grade1));
    school.student("B", Some(grade2));

    let engine = school.engine(TenantPolicy::default());
    let request = PromotionRequest::new(school.tenant, a);
    let report = engine.promote_one(&request, None).unwrap();

    assert_eq!(report.status, PromotionStatus::Applied);
    assert_eq!(report.to_level_id, Some(grade2));
}
