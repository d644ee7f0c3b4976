//! Per-tenant progression policy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a batch decides whether a student moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressionMode {
    /// Every student with a resolvable destination moves.
    Automatic,
    /// Only students whose aggregated score meets the pass threshold move.
    Threshold,
}

impl ProgressionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Threshold => "threshold",
        }
    }
}

/// Policy applied to one tenant's progression runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantPolicy {
    #[serde(default = "default_mode")]
    pub mode: ProgressionMode,

    /// Minimum aggregated percentage to move up in threshold mode.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Reserved name of the terminal (graduated) level.
    #[serde(default = "default_terminal_level_name")]
    pub terminal_level_name: String,

    /// Cycle position of the period that closes an academic cycle.
    #[serde(default = "default_final_cycle_position")]
    pub final_cycle_position: u8,
}

fn default_mode() -> ProgressionMode {
    ProgressionMode::Automatic
}

fn default_pass_threshold() -> f64 {
    50.0
}

fn default_terminal_level_name() -> String {
    "Graduated".to_string()
}

fn default_final_cycle_position() -> u8 {
    3
}

impl Default for TenantPolicy {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            pass_threshold: default_pass_threshold(),
            terminal_level_name: default_terminal_level_name(),
            final_cycle_position: default_final_cycle_position(),
        }
    }
}

impl TenantPolicy {
    pub fn threshold(pass_threshold: f64) -> Self {
        Self {
            mode: ProgressionMode::Threshold,
            pass_threshold,
            ..Self::default()
        }
    }

    /// Returns a description of the first invalid field, if any.
    pub fn validate(&self) -> Option<String> {
        if !self.pass_threshold.is_finite() || !(0.0..=100.0).contains(&self.pass_threshold) {
            return Some(format!(
                "pass_threshold must be within 0..=100, got {}",
                self.pass_threshold
            ));
        }
        if self.terminal_level_name.trim().is_empty() {
            return Some("terminal_level_name cannot be empty".to_string());
        }
        if self.final_cycle_position == 0 {
            return Some("final_cycle_position is 1-based".to_string());
        }
        None
    }

    /// Whether a mean score passes.
    pub fn passes(&self, mean_percentage: f64) -> bool {
        mean_percentage >= self.pass_threshold
    }
}

/// Source of per-tenant policy.
pub trait PolicySource {
    fn policy_for(&self, tenant_id: Uuid) -> TenantPolicy;
}

impl PolicySource for TenantPolicy {
    fn policy_for(&self, _tenant_id: Uuid) -> TenantPolicy {
        self.clone()
    }
}
