//! Backoff policy for failed-build recovery.
//!
//! `wait(attempt) = min(max, min * factor^attempt)`. With the defaults this
//! yields 5s, 10s, 20s, 40s and then 60s for every later attempt.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff between recovery attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Wait before the first retry, in seconds.
    #[serde(default = "default_min_seconds")]
    pub min_seconds: f64,
    /// Upper bound on any wait, in seconds.
    #[serde(default = "default_max_seconds")]
    pub max_seconds: f64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Randomize each wait between `min_seconds` and the computed value.
    #[serde(default)]
    pub jitter: bool,
}

fn default_min_seconds() -> f64 {
    5.0
}

fn default_max_seconds() -> f64 {
    60.0
}

fn default_factor() -> f64 {
    2.0
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_seconds: default_min_seconds(),
            max_seconds: default_max_seconds(),
            factor: default_factor(),
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum wait.
    #[must_use]
    pub fn with_min_seconds(mut self, seconds: f64) -> Self {
        self.min_seconds = seconds;
        self
    }

    /// Sets the maximum wait.
    #[must_use]
    pub fn with_max_seconds(mut self, seconds: f64) -> Self {
        self.max_seconds = seconds;
        self
    }

    /// Sets the growth factor.
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the minimum wait before retry number `attempt + 1` may start.
    #[must_use]
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.min_seconds * self.factor.powi(exponent);
        let capped = if raw.is_finite() {
            raw.min(self.max_seconds)
        } else {
            self.max_seconds
        };

        let seconds = if self.jitter && capped > self.min_seconds {
            rand::thread_rng().gen_range(self.min_seconds..=capped)
        } else {
            capped
        };

        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_seconds.is_finite() && self.min_seconds >= 0.0) {
            return Err("min_seconds must be a non-negative number".to_string());
        }
        if !(self.max_seconds.is_finite() && self.max_seconds >= self.min_seconds) {
            return Err("max_seconds must be >= min_seconds".to_string());
        }
        if !(self.factor.is_finite() && self.factor >= 1.0) {
            return Err("factor must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Bounds on automatic recovery of failed builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Retries allowed before a build is frozen into `Error`.
    #[serde(default = "default_attempt_max")]
    pub attempt_max: u32,
    /// Wait between retries.
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

fn default_attempt_max() -> u32 {
    5
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            attempt_max: default_attempt_max(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RecoveryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry bound.
    #[must_use]
    pub fn with_attempt_max(mut self, attempt_max: u32) -> Self {
        self.attempt_max = attempt_max;
        self
    }

    /// Sets the backoff.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), String> {
        self.backoff.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waits() {
        let policy = BackoffPolicy::default();
        let waits: Vec<u64> = (0..=4).map(|a| policy.wait_for(a).as_secs()).collect();
        assert_eq!(waits, vec![5, 10, 20, 40, 60]);
    }

    #[test]
    fn test_wait_stays_capped() {
        let policy = BackoffPolicy::default();
        for attempt in 4..40 {
            assert_eq!(policy.wait_for(attempt), Duration::from_secs(60));
        }
        assert_eq!(policy.wait_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_custom_policy() {
        let policy = BackoffPolicy::new()
            .with_min_seconds(1.0)
            .with_max_seconds(8.0)
            .with_factor(3.0);
        assert_eq!(policy.wait_for(0), Duration::from_secs(1));
        assert_eq!(policy.wait_for(1), Duration::from_secs(3));
        assert_eq!(policy.wait_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = BackoffPolicy::default().with_jitter(true);
        for _ in 0..100 {
            let wait = policy.wait_for(3);
            assert!(wait >= Duration::from_secs(5));
            assert!(wait <= Duration::from_secs(40));
        }
    }

    #[test]
    fn test_recovery_policy_defaults() {
        let policy = RecoveryPolicy::default();
        assert_eq!(policy.attempt_max, 5);
        assert_eq!(policy.backoff, BackoffPolicy::default());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_shrinking_factor() {
        assert!(BackoffPolicy::new().with_factor(0.5).validate().is_err());
        assert!(BackoffPolicy::new().with_max_seconds(1.0).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_policy() {
        let policy: RecoveryPolicy =
            serde_json::from_str(r#"{"attempt_max": 3, "backoff": {"max_seconds": 30}}"#).unwrap();
        assert_eq!(policy.attempt_max, 3);
        assert_eq!(policy.backoff.min_seconds, 5.0);
        assert_eq!(policy.backoff.wait_for(4), Duration::from_secs(30));
    }
}
