//! Engine configuration.
//!
//! Loaded from JSON, then optionally overridden from the environment:
//!
//! | Variable                   | Field                  |
//! |----------------------------|------------------------|
//! | `BUILDFLOW_EXECUTOR_IMAGE` | `executor.image`       |
//! | `BUILDFLOW_ATTEMPT_MAX`    | `recovery.attempt_max` |
//! | `BUILDFLOW_LOG_FORMAT`     | `log_format`           |

use crate::errors::{BuildflowError, Result};
use crate::manager::RequeueConfig;
use crate::observability::LogFormat;
use crate::pipeline::RecoveryPolicy;
use crate::strategy::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Overrides the executor image.
pub const ENV_EXECUTOR_IMAGE: &str = "BUILDFLOW_EXECUTOR_IMAGE";
/// Overrides the retry budget.
pub const ENV_ATTEMPT_MAX: &str = "BUILDFLOW_ATTEMPT_MAX";
/// Overrides the log format.
pub const ENV_LOG_FORMAT: &str = "BUILDFLOW_LOG_FORMAT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildflowConfig {
    /// Failed-build recovery.
    #[serde(default)]
    pub recovery: RecoveryPolicy,
    /// Requeue delays of the reconcile loop.
    #[serde(default)]
    pub requeue: RequeueConfig,
    /// Pod executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl BuildflowConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_json_str(&json)
    }

    /// Sets the recovery policy.
    #[must_use]
    pub fn with_recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Sets the requeue delays.
    #[must_use]
    pub fn with_requeue(mut self, requeue: RequeueConfig) -> Self {
        self.requeue = requeue;
        self
    }

    /// Sets the executor settings.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(image) = lookup(ENV_EXECUTOR_IMAGE) {
            self.executor.image = image;
        }
        if let Some(raw) = lookup(ENV_ATTEMPT_MAX) {
            self.recovery.attempt_max = raw.trim().parse().map_err(|_| {
                BuildflowError::Configuration(format!(
                    "{ENV_ATTEMPT_MAX} must be a non-negative integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            self.log_format = raw.parse().map_err(BuildflowError::Configuration)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.recovery
            .validate()
            .and_then(|()| self.requeue.validate())
            .map_err(BuildflowError::Configuration)?;
        if self.executor.image.trim().is_empty() {
            return Err(BuildflowError::Configuration(
                "executor image must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
