//! In-memory store
//!
//! Shares one committed dataset between clones. Used by tests and by
//! embedders that manage persistence themselves.

use std::sync::{Arc, Mutex};

use super::dataset::Dataset;
use super::errors::{StoreError, StoreResult};
use super::traits::Datastore;
use super::transaction::{CommitTarget, DatasetTransaction};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            committed: Arc::new(Mutex::new(dataset)),
        }
    }

    /// Copy of the committed dataset.
    pub fn snapshot(&self) -> StoreResult<Dataset> {
        let committed = self.committed.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(committed.clone())
    }
}

impl Datastore for MemoryStore {
    type Tx = DatasetTransaction;

    fn begin(&self) -> StoreResult<DatasetTransaction> {
        let committed = self.snapshot()?;
        Ok(DatasetTransaction::new(
            committed,
            CommitTarget::Memory(Arc::clone(&self.committed)),
        ))
    }
}
