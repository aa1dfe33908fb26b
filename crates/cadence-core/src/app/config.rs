//! Scheduler configuration
//!
//! Parsed from a TOML file. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Flag-store namespace for battle cycle stop flags.
    pub stop_flag_namespace: String,
    /// Repeating-job names are `{job_name_prefix}{actor_id}`.
    pub job_name_prefix: String,
    /// How often the orphaned-effect sweep runs. 0 disables it.
    pub reconcile_interval_ms: u64,
    /// An effect entry counts as orphaned only when it has not been touched
    /// for its interval plus this grace.
    pub reconcile_grace_ms: u64,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stop_flag_namespace: "battle-cycle-stop-flags".to_string(),
            job_name_prefix: "battle-cycle-".to_string(),
            reconcile_interval_ms: 30_000,
            reconcile_grace_ms: 5_000,
            log_filter: "info".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// `None` when the sweep is disabled.
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_ms > 0).then(|| Duration::from_millis(self.reconcile_interval_ms))
    }

    pub fn reconcile_grace(&self) -> Duration {
        Duration::from_millis(self.reconcile_grace_ms)
    }

    pub fn job_name(&self, actor_id: &str) -> String {
        format!("{}{}", self.job_name_prefix, actor_id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stop_flag_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "stop_flag_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
