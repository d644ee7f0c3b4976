//! Seeded school fixture for unit tests.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::model::{CourseOffering, Enrollment, Level, Period, ScoreRecord, Student};
use crate::storage::{Dataset, MemoryStore};

pub(crate) struct School {
    pub tenant: Uuid,
    pub data: Dataset,
    /// Period used for seeded enrollments and scores.
    pub period: Uuid,
}

impl School {
    /// A tenant whose current period closes the cycle (position 3).
    pub fn new() -> Self {
        let tenant = Uuid::new_v4();
        let mut data = Dataset::new();
        let mut period = Period::new(tenant, date(2025, 4, 1), 3);
        period.is_current = true;
        let period = data.insert_period(period);
        Self {
            tenant,
            data,
            period,
        }
    }

    pub fn level(&mut self, rank: i32, name: &str) -> Uuid {
        self.data.insert_level(Level::new(self.tenant, rank, name))
    }

    pub fn course(&mut self, code: &str, level: Option<Uuid>) -> Uuid {
        self.data
            .insert_course(CourseOffering::new(self.tenant, code, level))
    }

    pub fn student(&mut self, name: &str, level: Option<Uuid>) -> Uuid {
        self.data
            .insert_student(Student::new(self.tenant, name, level))
    }

    pub fn enroll(&mut self, student: Uuid, course: Uuid) -> Uuid {
        self.data
            .enroll(Enrollment::active(self.tenant, student, course, self.period))
    }

    pub fn score(&mut self, student: Uuid, percentage: Option<f64>) {
        self.data.insert_score(ScoreRecord {
            tenant_id: self.tenant,
            student_id: student,
            period_id: self.period,
            percentage,
        });
    }

    pub fn store(&self) -> MemoryStore {
        MemoryStore::from_dataset(self.data.clone())
    }
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
