//! Outer reconcile loop.
//!
//! One call per build identity per tick: look the record up, decide between
//! schedule and reconcile, and tell the caller when to come back.

use super::BuildManager;
use crate::actions::RecoveryState;
use crate::core::{BuildPhase, ContainerBuild, ObjectKey};
use crate::errors::Result;
use crate::observability::TickTimer;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};

/// Requeue delays handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequeueConfig {
    /// Delay after a build was scheduled or (re-)initialized.
    #[serde(default = "default_new_build_seconds")]
    pub new_build_seconds: u64,
    /// Delay while a build is launched and running.
    #[serde(default = "default_running_seconds")]
    pub running_seconds: u64,
    /// Lower bound on any requeue delay.
    #[serde(default = "default_min_seconds")]
    pub min_seconds: u64,
}

fn default_new_build_seconds() -> u64 {
    10
}

fn default_running_seconds() -> u64 {
    30
}

fn default_min_seconds() -> u64 {
    1
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            new_build_seconds: default_new_build_seconds(),
            running_seconds: default_running_seconds(),
            min_seconds: default_min_seconds(),
        }
    }
}

impl RequeueConfig {
    /// Sets the delay after scheduling.
    #[must_use]
    pub fn with_new_build_seconds(mut self, seconds: u64) -> Self {
        self.new_build_seconds = seconds;
        self
    }

    /// Sets the delay while running.
    #[must_use]
    pub fn with_running_seconds(mut self, seconds: u64) -> Self {
        self.running_seconds = seconds;
        self
    }

    fn new_build(&self) -> Duration {
        self.at_least(Duration::from_secs(self.new_build_seconds))
    }

    fn running(&self) -> Duration {
        self.at_least(Duration::from_secs(self.running_seconds))
    }

    fn at_least(&self, delay: Duration) -> Duration {
        delay.max(Duration::from_secs(self.min_seconds))
    }

    /// Validates the delays.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_seconds == 0 {
            return Err("requeue min_seconds must be at least 1".to_string());
        }
        Ok(())
    }
}

/// What the caller should do after a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Phase after the tick; `None` when the record no longer exists.
    pub phase: Option<BuildPhase>,
    /// When to reconcile again; `None` means the build needs no more ticks.
    pub requeue_after: Option<Duration>,
}

impl ReconcileResult {
    /// No further ticks needed.
    #[must_use]
    pub fn done(phase: Option<BuildPhase>) -> Self {
        Self {
            phase,
            requeue_after: None,
        }
    }

    /// Reconcile again after `after`.
    #[must_use]
    pub fn requeue(phase: BuildPhase, after: Duration) -> Self {
        Self {
            phase: Some(phase),
            requeue_after: Some(after),
        }
    }

    /// Returns true if the caller should come back.
    #[must_use]
    pub fn should_requeue(&self) -> bool {
        self.requeue_after.is_some()
    }
}

/// Reconciles builds by identity.
#[derive(Debug, Clone)]
pub struct BuildReconciler {
    manager: Arc<BuildManager>,
    requeue: RequeueConfig,
}

impl BuildReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(manager: Arc<BuildManager>, requeue: RequeueConfig) -> Self {
        Self { manager, requeue }
    }

    /// Returns the manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<BuildManager> {
        &self.manager
    }

    /// Runs one tick for `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileResult> {
        let span = info_span!("reconcile", build = %key);
        self.reconcile_inner(key).instrument(span).await
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> Result<ReconcileResult> {
        let timer = TickTimer::start(key.to_string());

        let mut build = match self.manager.get_build(key).await {
            Ok(build) => build,
            Err(err) if err.is_not_found() => {
                debug!("Build no longer exists");
                return Ok(ReconcileResult::done(None));
            }
            Err(err) => return Err(err),
        };

        let result = match build.phase() {
            BuildPhase::None => {
                self.manager.schedule(&mut build).await?;
                ReconcileResult::requeue(build.phase(), self.requeue.new_build())
            }
            BuildPhase::Succeeded | BuildPhase::Error => {
                ReconcileResult::done(Some(build.phase()))
            }
            _ => {
                self.manager.reconcile(&mut build).await?;
                self.after_tick(&build)
            }
        };

        debug!(
            phase = ?result.phase,
            requeue_after_ms = result.requeue_after.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            elapsed_ms = timer.finish(),
            "Reconciled"
        );
        Ok(result)
    }

    fn after_tick(&self, build: &ContainerBuild) -> ReconcileResult {
        let phase = build.phase();
        match phase {
            BuildPhase::Succeeded | BuildPhase::Error => ReconcileResult::done(Some(phase)),
            BuildPhase::Failed => {
                let delay = match self.manager.recovery_state(build) {
                    RecoveryState::AwaitingBackoff { remaining } => remaining,
                    RecoveryState::NoRecordYet
                    | RecoveryState::ReadyToRetry
                    | RecoveryState::Exhausted => Duration::ZERO,
                };
                ReconcileResult::requeue(phase, self.requeue.at_least(delay))
            }
            BuildPhase::None | BuildPhase::Initialization | BuildPhase::Scheduling => {
                ReconcileResult::requeue(phase, self.requeue.new_build())
            }
            BuildPhase::Pending | BuildPhase::Running => {
                ReconcileResult::requeue(phase, self.requeue.running())
            }
        }
    }

    /// Runs one tick for each distinct identity in `keys`, concurrently.
    ///
    /// Duplicate identities are collapsed so that no identity is ticked twice
    /// in the same batch. Results are returned in first-seen order.
    pub async fn reconcile_batch(
        &self,
        keys: &[ObjectKey],
    ) -> Vec<(ObjectKey, Result<ReconcileResult>)> {
        let mut seen = HashSet::new();
        let unique: Vec<&ObjectKey> = keys.iter().filter(|k| seen.insert(*k)).collect();
        if unique.len() < keys.len() {
            debug!(
                requested = keys.len(),
                distinct = unique.len(),
                "Collapsed duplicate identities"
            );
        }

        let results = join_all(unique.iter().map(|key| self.reconcile(key))).await;
        for (key, result) in unique.iter().zip(&results) {
            if let Err(err) = result {
                warn!(build = %key, error = %err, transient = err.is_transient(), "Reconcile failed");
            }
        }

        unique.into_iter().cloned().zip(results).collect()
    }
}
