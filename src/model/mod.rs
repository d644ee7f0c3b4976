//! Data model for the progression engine.

mod audit;
mod records;

pub use audit::{ChangeSet, CorrelationFilter, EnrollmentSnapshot, PromotionRecord};
pub use records::{
    CourseOffering, Enrollment, EnrollmentStatus, Level, Period, ScoreRecord, Student,
};
