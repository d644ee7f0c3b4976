//! Engine configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration. Validation runs on load; an invalid file never produces
//! a partially applied config.

mod policy;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event, Severity};

pub use policy::{PolicySource, ProgressionMode, TenantPolicy};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Lowest emitted log severity (default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Actor recorded on audit rows when the caller names none
    #[serde(default = "default_triggered_by")]
    pub default_triggered_by: String,

    /// Policy for tenants without an override
    #[serde(default)]
    pub default_policy: TenantPolicy,

    /// Per-tenant overrides
    #[serde(default)]
    pub tenants: BTreeMap<Uuid, TenantPolicy>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_triggered_by() -> String {
    "system".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_triggered_by: default_triggered_by(),
            default_policy: TenantPolicy::default(),
            tenants: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_json(&content)?;

        let tenants = config.tenants.len().to_string();
        let path_str = path.display().to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", path_str.as_str()), ("tenant_overrides", tenants.as_str())],
        );

        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.severity()?;

        if self.default_triggered_by.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_triggered_by cannot be empty".to_string(),
            ));
        }

        if let Some(reason) = self.default_policy.validate() {
            return Err(ConfigError::Invalid(format!("default_policy: {}", reason)));
        }

        for (tenant_id, policy) in &self.tenants {
            if let Some(reason) = policy.validate() {
                return Err(ConfigError::Invalid(format!("tenant {}: {}", tenant_id, reason)));
            }
        }

        Ok(())
    }

    /// Parsed log level
    pub fn severity(&self) -> ConfigResult<Severity> {
        Severity::parse(&self.log_level)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown log_level: {}", self.log_level)))
    }

    /// Set a tenant override.
    pub fn with_tenant(mut self, tenant_id: Uuid, policy: TenantPolicy) -> Self {
        self.tenants.insert(tenant_id, policy);
        self
    }
}

impl PolicySource for EngineConfig {
    fn policy_for(&self, tenant_id: Uuid) -> TenantPolicy {
        self.tenants
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| self.default_policy.clone())
    }
}
