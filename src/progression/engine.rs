//! Progression engine facade
//!
//! Every operation accepts an optional caller transaction. With `Some`, the
//! engine only reads and writes through it and never begins, commits or
//! rolls back. With `None`, the engine opens its own transaction and commits
//! it on success (dry runs and previews are always rolled back).

use uuid::Uuid;

use super::errors::ProgressionResult;
use super::executor::PromotionExecutor;
use super::hierarchy::LevelHierarchy;
use super::orchestrator::ProgressionOrchestrator;
use super::preview::PreviewService;
use super::report::{BatchReport, PreviewReport, PromotionReport, PromotionStatus, RevertReport};
use super::request::{BatchRequest, PromotionRequest, RevertRequest};
use super::revert::RevertCoordinator;
use crate::config::{EngineConfig, PolicySource};
use crate::observability::{MetricsSnapshot, ProgressionMetrics};
use crate::storage::{Datastore, Transaction};

/// Whether an engine-owned transaction is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Commit,
    Rollback,
}

pub struct ProgressionEngine<S, P> {
    store: S,
    policies: P,
    default_triggered_by: String,
    metrics: ProgressionMetrics,
}

impl<S: Datastore> ProgressionEngine<S, EngineConfig> {
    /// Engine driven by a loaded configuration file.
    pub fn from_config(store: S, config: EngineConfig) -> Self {
        let actor = config.default_triggered_by.clone();
        Self::new(store, config).with_default_triggered_by(actor)
    }
}

impl<S, P> ProgressionEngine<S, P>
where
    S: Datastore,
    P: PolicySource,
{
    pub fn new(store: S, policies: P) -> Self {
        Self {
            store,
            policies,
            default_triggered_by: "system".to_string(),
            metrics: ProgressionMetrics::new(),
        }
    }

    pub fn with_default_triggered_by(mut self, actor: impl Into<String>) -> Self {
        self.default_triggered_by = actor.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Promote one student to its rank successor or an explicit target.
    pub fn promote_one(
        &self,
        request: &PromotionRequest,
        tx: Option<&mut S::Tx>,
    ) -> ProgressionResult<PromotionReport> {
        let policy = self.policies.policy_for(request.tenant_id);
        let actor = self.actor(request.triggered_by.as_deref());
        let finish = if request.dry_run { Finish::Rollback } else { Finish::Commit };

        let report = self.run_in(tx, finish, |tx| {
            let hierarchy = LevelHierarchy::resolve(&*tx, request.tenant_id, &policy.terminal_level_name)?;
            PromotionExecutor::execute(tx, &hierarchy, request, actor)
        })?;

        match report.status {
            PromotionStatus::Applied => self.metrics.increment_records_written(),
            PromotionStatus::Previewed => self.metrics.increment_dry_runs(),
            PromotionStatus::NoOp | PromotionStatus::Terminal => {}
        }
        Ok(report)
    }

    /// Promote every student of a tenant according to its policy.
    pub fn promote_batch(&self, request: &BatchRequest, tx: Option<&mut S::Tx>) -> ProgressionResult<BatchReport> {
        let policy = self.policies.policy_for(request.tenant_id);
        let actor = self.actor(request.triggered_by.as_deref());
        let finish = if request.dry_run { Finish::Rollback } else { Finish::Commit };

        self.run_in(tx, finish, |tx| {
            ProgressionOrchestrator::new(&policy, actor, &self.metrics).run(tx, request)
        })
    }

    /// Project a batch without writing anything.
    pub fn preview_batch(&self, tenant_id: Uuid, tx: Option<&mut S::Tx>) -> ProgressionResult<PreviewReport> {
        let policy = self.policies.policy_for(tenant_id);
        self.run_in(tx, Finish::Rollback, |tx| {
            PreviewService::preview(&*tx, tenant_id, &policy)
        })
    }

    /// Restore the level pointers recorded by one run.
    pub fn revert_batch(&self, request: &RevertRequest, tx: Option<&mut S::Tx>) -> ProgressionResult<RevertReport> {
        self.run_in(tx, Finish::Commit, |tx| {
            RevertCoordinator::new(&self.metrics).run(tx, request)
        })
    }

    fn actor<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|actor| !actor.trim().is_empty())
            .unwrap_or(&self.default_triggered_by)
    }

    fn run_in<O, F>(&self, tx: Option<&mut S::Tx>, finish: Finish, f: F) -> ProgressionResult<O>
    where
        F: FnOnce(&mut S::Tx) -> ProgressionResult<O>,
    {
        if let Some(tx) = tx {
            return f(tx);
        }

        let mut owned = self.store.begin()?;
        match f(&mut owned) {
            Ok(output) => {
                match finish {
                    Finish::Commit => owned.commit()?,
                    Finish::Rollback => owned.rollback(),
                }
                Ok(output)
            }
            Err(e) => {
                owned.rollback();
                Err(e)
            }
        }
    }
}
