//! progression - academic progression engine
//!
//! Moves students between ranked levels at the end of an academic cycle,
//! reconciles their enrollments, audits every transition and can revert a
//! run by correlation id.

pub mod cli;
pub mod config;
pub mod model;
pub mod observability;
pub mod progression;
pub mod storage;

pub use config::{EngineConfig, PolicySource, ProgressionMode, TenantPolicy};
pub use progression::{
    BatchReport, BatchRequest, ProgressionEngine, ProgressionError, ProgressionErrorKind,
    PromotionReport, PromotionRequest, RevertReport, RevertRequest, RevertScope,
};
pub use storage::{Datastore, FileStore, MemoryStore, Transaction};
