//! Storage subsystem for the progression engine
//!
//! Defines the store interfaces the engine consumes and two bundled
//! backends sharing one transaction implementation.
//!
//! # Design Principles
//!
//! - All engine writes go through a caller- or engine-owned transaction
//! - Nothing is visible to other readers before commit
//! - Savepoints isolate one student's writes inside a batch
//! - A commit against a stale base revision is rejected, never merged
//! - Data files are checksum-verified on every load

mod checksum;
mod dataset;
mod errors;
mod file;
mod memory;
mod traits;
mod transaction;

pub use checksum::compute_checksum;
pub use dataset::Dataset;
pub use errors::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{Datastore, Savepoint, SchoolRecords, ScoreSource, Transaction};
pub use transaction::DatasetTransaction;
