//! Progression metrics
//!
//! Counters only. Monotonic, reset only when the registry is recreated.
//! Relaxed ordering: values are exact per counter, not across counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one engine instance
#[derive(Debug, Default)]
pub struct ProgressionMetrics {
    /// Students moved to the next rank
    promotions: AtomicU64,
    /// Students moved to the terminal level
    graduations: AtomicU64,
    /// Students held back by threshold policy
    retentions: AtomicU64,
    /// Per-student failures isolated inside a batch
    student_failures: AtomicU64,
    /// Audit records written
    records_written: AtomicU64,
    /// Transitions computed in dry-run mode
    dry_runs: AtomicU64,
    /// Batch runs completed
    batches: AtomicU64,
    /// Batch runs aborted before processing students
    batches_aborted: AtomicU64,
    /// Level pointers restored by revert
    reverts: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub promotions: u64,
    pub graduations: u64,
    pub retentions: u64,
    pub student_failures: u64,
    pub records_written: u64,
    pub dry_runs: u64,
    pub batches: u64,
    pub batches_aborted: u64,
    pub reverts: u64,
}

impl ProgressionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_promotions(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_graduations(&self) {
        self.graduations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retentions(&self) {
        self.retentions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_student_failures(&self) {
        self.student_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dry_runs(&self) {
        self.dry_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches_aborted(&self) {
        self.batches_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_reverts(&self, count: u64) {
        self.reverts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            promotions: self.promotions.load(Ordering::Relaxed),
            graduations: self.graduations.load(Ordering::Relaxed),
            retentions: self.retentions.load(Ordering::Relaxed),
            student_failures: self.student_failures.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            dry_runs: self.dry_runs.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            batches_aborted: self.batches_aborted.load(Ordering::Relaxed),
            reverts: self.reverts.load(Ordering::Relaxed),
        }
    }
}
