//! Level Hierarchy Resolution
//!
//! Levels are ordered by rank and the successor of a level is the level whose
//! rank is exactly one greater. The hierarchy is rebuilt on every operation
//! from the current level rows; no "next" pointer is ever stored.
//!
//! The terminal level (reserved name) is not part of the ranked hierarchy. It
//! is looked up separately by name when a student has no successor.

use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use super::errors::ProgressionResult;
use crate::model::Level;
use crate::observability::{log_event_with_fields, Event};
use crate::storage::SchoolRecords;

/// Where the levels of a hierarchy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchySource {
    /// Levels tagged with the tenant
    Scoped,
    /// Degraded: levels referenced by the tenant's students
    DerivedFromStudents,
}

/// Rank-ordered levels of one tenant.
#[derive(Debug, Clone)]
pub struct LevelHierarchy {
    levels: Vec<Level>,
    index_by_rank: HashMap<i32, usize>,
    index_by_id: HashMap<Uuid, usize>,
    terminal_name: String,
    source: HierarchySource,
}

impl LevelHierarchy {
    /// Build from raw level rows. Terminal-named levels are dropped and rows
    /// are de-duplicated by id. When two levels share a rank, the first in
    /// rank/name order owns the rank for successor lookups.
    pub fn from_levels(mut levels: Vec<Level>, terminal_name: &str, source: HierarchySource) -> Self {
        levels.retain(|l| !l.is_terminal(terminal_name));
        levels.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        levels.dedup_by_key(|l| l.id);

        let mut index_by_rank = HashMap::with_capacity(levels.len());
        let mut index_by_id = HashMap::with_capacity(levels.len());
        for (idx, level) in levels.iter().enumerate() {
            index_by_rank.entry(level.rank).or_insert(idx);
            index_by_id.insert(level.id, idx);
        }

        Self {
            levels,
            index_by_rank,
            index_by_id,
            terminal_name: terminal_name.to_string(),
            source,
        }
    }

    /// Resolve the tenant's hierarchy, falling back to student references
    /// when no level is tagged with the tenant.
    pub fn resolve<R>(records: &R, tenant_id: Uuid, terminal_name: &str) -> ProgressionResult<Self>
    where
        R: SchoolRecords + ?Sized,
    {
        let scoped = Self::from_levels(records.levels(tenant_id)?, terminal_name, HierarchySource::Scoped);
        if !scoped.is_empty() {
            return Ok(scoped);
        }

        let derived = Self::from_levels(
            records.levels_referenced_by_students(tenant_id)?,
            terminal_name,
            HierarchySource::DerivedFromStudents,
        );

        let tenant = tenant_id.to_string();
        if derived.is_empty() {
            log_event_with_fields(Event::HierarchyEmpty, &[("tenant_id", tenant.as_str())]);
        } else {
            let count = derived.len().to_string();
            log_event_with_fields(
                Event::LevelFallbackUsed,
                &[("tenant_id", tenant.as_str()), ("levels", count.as_str())],
            );
        }

        Ok(derived)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn source(&self) -> HierarchySource {
        self.source
    }

    /// Reserved name of the terminal level this hierarchy was built with.
    pub fn terminal_name(&self) -> &str {
        &self.terminal_name
    }

    pub fn is_terminal(&self, level: &Level) -> bool {
        level.is_terminal(&self.terminal_name)
    }

    pub fn level_ids(&self) -> Vec<Uuid> {
        self.levels.iter().map(|l| l.id).collect()
    }

    pub fn get(&self, level_id: Uuid) -> Option<&Level> {
        self.index_by_id.get(&level_id).map(|&idx| &self.levels[idx])
    }

    pub fn contains(&self, level_id: Uuid) -> bool {
        self.index_by_id.contains_key(&level_id)
    }

    /// Level with rank exactly one greater than `level`, or `None` when
    /// `level` is the end of the ranked chain or is itself terminal.
    pub fn next_level(&self, level: &Level) -> Option<&Level> {
        if self.is_terminal(level) {
            return None;
        }
        let next_rank = level.rank.checked_add(1)?;
        self.index_by_rank
            .get(&next_rank)
            .map(|&idx| &self.levels[idx])
    }

    /// Successor of the level with `level_id`, if that level is known.
    pub fn next_level_of(&self, level_id: Uuid) -> Option<&Level> {
        self.get(level_id).and_then(|l| self.next_level(l))
    }

    /// rank → successor level id, for every rank that has a successor.
    pub fn next_by_rank(&self) -> BTreeMap<i32, Uuid> {
        self.index_by_rank
            .iter()
            .filter_map(|(&rank, &idx)| self.next_level(&self.levels[idx]).map(|n| (rank, n.id)))
            .collect()
    }

    pub fn highest(&self) -> Option<&Level> {
        self.levels.last()
    }
}
