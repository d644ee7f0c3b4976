//! Enrollment Reconciliation
//!
//! Computes which enrollments a student drops, keeps and gains when moving
//! to a destination level:
//!
//! - remove: the course is bound to a level, and that level is not the destination
//! - add: the course is bound to the destination and the student has no enrollment in it
//! - retain: everything not removed (cross-level electives always land here)
//!
//! Reconciling a state that is already reconciled yields no adds and no removes.

use std::collections::{BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use super::errors::ProgressionResult;
use crate::model::{ChangeSet, CourseOffering, Enrollment};
use crate::storage::SchoolRecords;

/// Result of reconciling one student against a destination level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentDiff {
    pub to_remove: Vec<Enrollment>,
    pub to_add: Vec<CourseOffering>,
    pub retained: Vec<Enrollment>,
}

impl EnrollmentDiff {
    pub fn removed_course_ids(&self) -> BTreeSet<Uuid> {
        self.to_remove.iter().map(|e| e.course_offering_id).collect()
    }

    pub fn added_course_ids(&self) -> BTreeSet<Uuid> {
        self.to_add.iter().map(|c| c.id).collect()
    }

    pub fn retained_course_ids(&self) -> BTreeSet<Uuid> {
        self.retained.iter().map(|e| e.course_offering_id).collect()
    }

    /// No enrollment would change.
    pub fn is_settled(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    pub fn change_set(&self) -> ChangeSet {
        ChangeSet {
            added: self.added_course_ids(),
            removed: self.removed_course_ids(),
            retained: self.retained_course_ids(),
        }
    }
}

/// A diff together with the course rows it was computed from.
#[derive(Debug, Clone)]
pub struct ReconciliationPlan {
    pub diff: EnrollmentDiff,
    /// Every course referenced by the current enrollments or offered at the
    /// destination, keyed by id.
    pub courses: HashMap<Uuid, CourseOffering>,
}

pub struct EnrollmentReconciler;

impl EnrollmentReconciler {
    /// Pure diff over already-loaded rows.
    ///
    /// Enrollments whose course is missing from `courses` are retained:
    /// without a course row there is no level binding to compare.
    pub fn diff(
        current: &[Enrollment],
        courses: &HashMap<Uuid, CourseOffering>,
        destination_level_id: Uuid,
        destination_offerings: &[CourseOffering],
    ) -> EnrollmentDiff {
        let mut diff = EnrollmentDiff::default();

        for enrollment in current {
            let bound_elsewhere = courses
                .get(&enrollment.course_offering_id)
                .and_then(|c| c.level_id)
                .map_or(false, |level_id| level_id != destination_level_id);

            if bound_elsewhere {
                diff.to_remove.push(enrollment.clone());
            } else {
                diff.retained.push(enrollment.clone());
            }
        }

        let enrolled: HashSet<Uuid> = current.iter().map(|e| e.course_offering_id).collect();
        let mut queued = HashSet::new();
        for offering in destination_offerings {
            if offering.level_id != Some(destination_level_id) {
                continue;
            }
            if enrolled.contains(&offering.id) || !queued.insert(offering.id) {
                continue;
            }
            diff.to_add.push(offering.clone());
        }

        diff
    }

    /// Load the courses involved and compute the diff.
    pub fn plan<R>(
        records: &R,
        tenant_id: Uuid,
        current: &[Enrollment],
        destination_level_id: Uuid,
    ) -> ProgressionResult<ReconciliationPlan>
    where
        R: SchoolRecords + ?Sized,
    {
        let mut courses = HashMap::new();
        for enrollment in current {
            if courses.contains_key(&enrollment.course_offering_id) {
                continue;
            }
            if let Some(course) = records.course(enrollment.course_offering_id)? {
                courses.insert(course.id, course);
            }
        }

        let offerings = records.courses_for_level(tenant_id, destination_level_id)?;
        for offering in &offerings {
            courses.entry(offering.id).or_insert_with(|| offering.clone());
        }

        let diff = Self::diff(current, &courses, destination_level_id, &offerings);
        Ok(ReconciliationPlan { diff, courses })
    }
}
