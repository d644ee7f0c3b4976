//! JSON data-file store
//!
//! The whole dataset lives in one file:
//!
//! ```text
//! PROGRESSION-DATA v1 <crc32 hex>\n
//! <dataset JSON>
//! ```
//!
//! Commits write a temp file, fsync it, then rename over the original, so a
//! crash leaves either the old or the new dataset on disk, never a mix.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::checksum::{compute_checksum, verify_checksum};
use super::dataset::Dataset;
use super::errors::{StoreError, StoreResult};
use super::traits::Datastore;
use super::transaction::{CommitTarget, DatasetTransaction};
use crate::observability::{log_event_with_fields, Event};

const HEADER_PREFIX: &str = "PROGRESSION-DATA v1 ";

/// Store persisting the dataset to a single checksummed JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open an existing data file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        // Validate up front so a corrupted file fails at open, not mid-run.
        if let Err(e) = read_dataset(&path) {
            if let StoreError::Corruption(reason) = &e {
                let path_str = path.display().to_string();
                log_event_with_fields(
                    Event::StoreCorruption,
                    &[("path", path_str.as_str()), ("reason", reason.as_str())],
                );
            }
            return Err(e);
        }
        Ok(Self { path })
    }

    /// Create a new data file holding `dataset`. Fails if the file exists.
    pub fn create(path: impl AsRef<Path>, dataset: &Dataset) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(StoreError::constraint(
                "data_file",
                format!("{} already exists", path.display()),
            ));
        }
        write_dataset(&path, dataset)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the committed dataset.
    pub fn load(&self) -> StoreResult<Dataset> {
        read_dataset(&self.path)
    }
}

impl Datastore for FileStore {
    type Tx = DatasetTransaction;

    fn begin(&self) -> StoreResult<DatasetTransaction> {
        let committed = read_dataset(&self.path)?;
        Ok(DatasetTransaction::new(
            committed,
            CommitTarget::File(self.path.clone()),
        ))
    }
}

/// Read and verify a data file.
pub(crate) fn read_dataset(path: &Path) -> StoreResult<Dataset> {
    let content = fs::read_to_string(path)
        .map_err(|e| StoreError::io(format!("reading {}", path.display()), e))?;

    let (header, body) = content
        .split_once('\n')
        .ok_or_else(|| StoreError::Corruption("missing header line".to_string()))?;

    let checksum_hex = header
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| StoreError::Corruption(format!("unrecognized header: {}", header)))?;

    let expected = u32::from_str_radix(checksum_hex.trim(), 16)
        .map_err(|e| StoreError::Corruption(format!("invalid checksum field: {}", e)))?;

    if !verify_checksum(body.as_bytes(), expected) {
        return Err(StoreError::Corruption(format!(
            "checksum mismatch in {}",
            path.display()
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| StoreError::Corruption(format!("invalid dataset JSON: {}", e)))
}

/// Atomically replace the data file with `dataset`.
pub(crate) fn write_dataset(path: &Path, dataset: &Dataset) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
        }
    }

    let body = serde_json::to_string_pretty(dataset)
        .map_err(|e| StoreError::Corruption(format!("failed to serialize dataset: {}", e)))?;
    let checksum = compute_checksum(body.as_bytes());

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| StoreError::io(format!("creating {}", temp_path.display()), e))?;

    write!(file, "{}{:08x}\n{}", HEADER_PREFIX, checksum, body)
        .map_err(|e| StoreError::io(format!("writing {}", temp_path.display()), e))?;

    file.sync_all()
        .map_err(|e| StoreError::io(format!("syncing {}", temp_path.display()), e))?;

    fs::rename(&temp_path, path)
        .map_err(|e| StoreError::io(format!("renaming onto {}", path.display()), e))?;

    Ok(())
}
