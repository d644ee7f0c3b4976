//! In-process dataset backing the bundled stores.
//!
//! Tables are ordered maps keyed by row id so iteration order is stable
//! across loads. Audit records keep append order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    CourseOffering, Enrollment, Level, Period, PromotionRecord, ScoreRecord, Student,
};

/// Every table the engine reads or writes, plus a commit revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Incremented on every successful commit.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub students: BTreeMap<Uuid, Student>,
    #[serde(default)]
    pub levels: BTreeMap<Uuid, Level>,
    #[serde(default)]
    pub courses: BTreeMap<Uuid, CourseOffering>,
    #[serde(default)]
    pub enrollments: BTreeMap<Uuid, Enrollment>,
    #[serde(default)]
    pub periods: BTreeMap<Uuid, Period>,
    #[serde(default)]
    pub scores: Vec<ScoreRecord>,
    #[serde(default)]
    pub promotion_records: Vec<PromotionRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_student(&mut self, student: Student) -> Uuid {
        let id = student.id;
        self.students.insert(id, student);
        id
    }

    pub fn insert_level(&mut self, level: Level) -> Uuid {
        let id = level.id;
        self.levels.insert(id, level);
        id
    }

    pub fn insert_course(&mut self, course: CourseOffering) -> Uuid {
        let id = course.id;
        self.courses.insert(id, course);
        id
    }

    pub fn insert_period(&mut self, period: Period) -> Uuid {
        let id = period.id;
        self.periods.insert(id, period);
        id
    }

    pub fn insert_score(&mut self, score: ScoreRecord) {
        self.scores.push(score);
    }

    /// Seed an enrollment and bump the course counter, as an initial
    /// registration would.
    pub fn enroll(&mut self, enrollment: Enrollment) -> Uuid {
        let id = enrollment.id;
        if let Some(course) = self.courses.get_mut(&enrollment.course_offering_id) {
            course.enrollment_count = course.enrollment_count.saturating_add(1);
        }
        self.enrollments.insert(id, enrollment);
        id
    }

    /// Course ids the student is enrolled in, sorted.
    pub fn course_ids_for_student(&self, student_id: Uuid) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .map(|e| e.course_offering_id)
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enroll_bumps_counter() {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let course = data.insert_course(CourseOffering::new(tenant, "MATH1", None));
        let student = data.insert_student(Student::new(tenant, "Ada", None));

        data.enroll(Enrollment::active(tenant, student, course, Uuid::new_v4()));

        assert_eq!(data.courses[&course].enrollment_count, 1);
        assert_eq!(data.course_ids_for_student(student), vec![course]);
    }

    #[test]
    fn test_dataset_json_roundtrip_keeps_revision() {
        let mut data = Dataset::new();
        data.revision = 7;
        data.insert_level(Level::new(Uuid::new_v4(), 1, "Grade 1"));

        let json = serde_json::to_string(&data).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_missing_tables_default_to_empty() {
        let back: Dataset = serde_json::from_str("{}").unwrap();
        assert_eq!(back.revision, 0);
        assert!(back.students.is_empty());
        assert!(back.promotion_records.is_empty());
    }
}
