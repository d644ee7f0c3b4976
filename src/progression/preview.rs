//! Batch preview
//!
//! Projects what a batch would do by rank lookup alone. Scores, periods and
//! enrollments are not consulted and nothing is written. Every tenant student
//! gets a row, including students with no level assigned.

use uuid::Uuid;

use super::errors::ProgressionResult;
use super::hierarchy::LevelHierarchy;
use super::orchestrator::derived_students;
use super::report::{PreviewAction, PreviewReport, PreviewRow};
use crate::config::TenantPolicy;
use crate::model::Student;
use crate::storage::SchoolRecords;

pub struct PreviewService;

impl PreviewService {
    pub fn preview<R>(records: &R, tenant_id: Uuid, policy: &TenantPolicy) -> ProgressionResult<PreviewReport>
    where
        R: SchoolRecords + ?Sized,
    {
        let mut report = PreviewReport::default();

        let hierarchy = LevelHierarchy::resolve(records, tenant_id, &policy.terminal_level_name)?;

        let terminal_id = records
            .find_level_by_name(tenant_id, &policy.terminal_level_name)?
            .map(|l| l.id);

        let mut students = records.students(tenant_id)?;
        if students.is_empty() {
            students = derived_students(records, tenant_id, &hierarchy)?;
        }

        for student in students {
            let row = Self::project(records, &hierarchy, terminal_id, student)?;
            report.push(row);
        }

        Ok(report)
    }

    fn project<R>(
        records: &R,
        hierarchy: &LevelHierarchy,
        terminal_id: Option<Uuid>,
        student: Student,
    ) -> ProgressionResult<PreviewRow>
    where
        R: SchoolRecords + ?Sized,
    {
        let mut row = PreviewRow {
            student_id: student.id,
            student_name: student.name,
            from_level_id: student.current_level_id,
            to_level_id: None,
            action: PreviewAction::Error,
            reason: None,
        };

        let Some(level_id) = student.current_level_id else {
            row.reason = Some("student has no current level".to_string());
            return Ok(row);
        };

        let Some(level) = records.level(level_id)? else {
            row.reason = Some(format!("level {} not found", level_id));
            return Ok(row);
        };

        if hierarchy.is_terminal(&level) {
            row.to_level_id = Some(level.id);
            row.action = PreviewAction::Unchanged;
            return Ok(row);
        }

        match hierarchy.next_level(&level) {
            Some(next) => {
                row.to_level_id = Some(next.id);
                row.action = PreviewAction::Promote;
            }
            None => {
                row.to_level_id = terminal_id;
                row.action = PreviewAction::Graduate;
            }
        }
        Ok(row)
    }
}
