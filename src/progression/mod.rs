//! Academic progression
//!
//! Moves students between ranked levels at the end of an academic cycle
//! and keeps their enrollments consistent with the new level.
//!
//! Components, leaves first:
//!
//! - `hierarchy`: rank-ordered levels, successor lookup
//! - `reconciler`: enrollment diff for one student and destination
//! - `executor`: one student's transition plus its audit record
//! - `orchestrator`: a tenant-wide batch with per-student isolation
//! - `preview`: read-only batch projection
//! - `revert`: undo a run by correlation id
//! - `engine`: transaction ownership around the four public operations
//!
//! # Invariants
//!
//! - A batch never fails because of one student
//! - An audit record is written once per applied transition and never changed
//! - Reconciling an already reconciled student changes nothing
//! - No successor pointer is stored; it is derived from rank on every run

mod engine;
mod errors;
mod executor;
mod hierarchy;
mod orchestrator;
mod preview;
mod reconciler;
mod report;
mod request;
mod revert;

#[cfg(test)]
mod testing;

pub use engine::ProgressionEngine;
pub use errors::{ProgressionError, ProgressionErrorKind, ProgressionResult};
pub use executor::PromotionExecutor;
pub use hierarchy::{HierarchySource, LevelHierarchy};
pub use orchestrator::ProgressionOrchestrator;
pub use preview::PreviewService;
pub use reconciler::{EnrollmentDiff, EnrollmentReconciler, ReconciliationPlan};
pub use report::{
    BatchReport, EntityError, PreviewAction, PreviewReport, PreviewRow, PromotionReport,
    PromotionStatus, RevertReport,
};
pub use request::{BatchRequest, PromotionRequest, RevertRequest, RevertScope, RunCorrelation};
pub use revert::RevertCoordinator;
