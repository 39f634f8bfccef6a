use super::Action;
use crate::core::{BuildFailure, BuildPhase, ContainerBuild, FailureRecovery};
use crate::errors::Result;
use crate::pipeline::RecoveryPolicy;
use crate::utils::{elapsed_between, Clock, Timestamp};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a failed build stands in its retry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// The failure has not been recorded yet.
    NoRecordYet,
    /// The next retry may not start for `remaining`.
    AwaitingBackoff {
        /// Time left before the retry is due.
        remaining: Duration,
    },
    /// The next retry is due.
    ReadyToRetry,
    /// No retries left.
    Exhausted,
}

impl RecoveryState {
    /// Derives the recovery state of a build from its failure record.
    #[must_use]
    pub fn evaluate(build: &ContainerBuild, policy: &RecoveryPolicy, now: Timestamp) -> Self {
        let Some(failure) = build.status.failure.as_ref() else {
            return Self::NoRecordYet;
        };
        let recovery = &failure.recovery;
        if recovery.attempt >= recovery.attempt_max {
            return Self::Exhausted;
        }

        let since = recovery.attempt_time.unwrap_or(failure.time);
        let elapsed = elapsed_between(since, now);
        let wait = policy.backoff.wait_for(recovery.attempt);
        if elapsed < wait {
            Self::AwaitingBackoff {
                remaining: wait - elapsed,
            }
        } else {
            Self::ReadyToRetry
        }
    }
}

/// Retries failed builds with exponential backoff and freezes them into
/// `Error` once the retry budget is spent.
#[derive(Debug, Clone)]
pub struct ErrorRecoveryAction {
    policy: RecoveryPolicy,
    clock: Arc<dyn Clock>,
}

impl ErrorRecoveryAction {
    /// Creates the action.
    #[must_use]
    pub fn new(policy: RecoveryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Returns the recovery state of `build` at the current time.
    #[must_use]
    pub fn state(&self, build: &ContainerBuild) -> RecoveryState {
        RecoveryState::evaluate(build, &self.policy, self.clock.now())
    }
}

#[async_trait]
impl Action for ErrorRecoveryAction {
    fn name(&self) -> &str {
        "error-recovery"
    }

    fn can_handle(&self, build: &ContainerBuild) -> bool {
        build.phase() == BuildPhase::Failed
    }

    async fn handle(&self, mut build: ContainerBuild) -> Result<Option<ContainerBuild>> {
        let now = self.clock.now();
        match RecoveryState::evaluate(&build, &self.policy, now) {
            RecoveryState::NoRecordYet => {
                let reason = build
                    .status
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string());
                debug!(build = %build.key, reason = %reason, "Recording build failure");
                build.status.failure = Some(BuildFailure {
                    reason,
                    time: now,
                    recovery: FailureRecovery {
                        attempt: 0,
                        attempt_max: self.policy.attempt_max,
                        attempt_time: None,
                    },
                });
                Ok(Some(build))
            }
            RecoveryState::Exhausted => {
                warn!(
                    build = %build.key,
                    attempts = build.status.failure.as_ref().map_or(0, |f| f.recovery.attempt),
                    "Recovery attempts exhausted, giving up"
                );
                build.status.phase = BuildPhase::Error;
                build.status.error = None;
                Ok(Some(build))
            }
            RecoveryState::AwaitingBackoff { remaining } => {
                debug!(
                    build = %build.key,
                    remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                    "Waiting before next recovery attempt"
                );
                Ok(None)
            }
            RecoveryState::ReadyToRetry => {
                let Some(failure) = build.status.failure.as_mut() else {
                    return Ok(None);
                };
                failure.recovery.attempt += 1;
                failure.recovery.attempt_time = Some(now);
                info!(
                    build = %build.key,
                    attempt = failure.recovery.attempt,
                    attempt_max = failure.recovery.attempt_max,
                    "Recovery attempt ({}/{})",
                    failure.recovery.attempt,
                    failure.recovery.attempt_max
                );
                build.status.phase = BuildPhase::Initialization;
                Ok(Some(build))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_build;
    use crate::utils::ManualClock;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn failed_build() -> ContainerBuild {
        let mut build = sample_build("greetings");
        build.status.phase = BuildPhase::Failed;
        build.status.error = Some("exit code 1".into());
        build
    }

    fn action(clock: &Arc<ManualClock>) -> ErrorRecoveryAction {
        ErrorRecoveryAction::new(RecoveryPolicy::default(), clock.clone())
    }

    #[tokio::test]
    async fn test_first_tick_only_records_failure() {
        let clock = Arc::new(ManualClock::default());
        let updated = action(&clock).handle(failed_build()).await.unwrap().unwrap();

        assert_eq!(updated.phase(), BuildPhase::Failed);
        let failure = updated.status.failure.unwrap();
        assert_eq!(failure.reason, "exit code 1");
        assert_eq!(failure.time, clock.now());
        assert_eq!(failure.recovery.attempt, 0);
        assert_eq!(failure.recovery.attempt_max, 5);
        assert!(failure.recovery.attempt_time.is_none());
    }

    #[tokio::test]
    async fn test_waits_for_backoff_then_retries() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let action = action(&clock);
        let recorded = action.handle(failed_build()).await.unwrap().unwrap();

        clock.advance_secs(4);
        assert_eq!(
            action.state(&recorded),
            RecoveryState::AwaitingBackoff {
                remaining: Duration::from_secs(1)
            }
        );
        assert!(action.handle(recorded.clone()).await.unwrap().is_none());

        clock.advance_secs(1);
        let retried = action.handle(recorded).await.unwrap().unwrap();
        assert_eq!(retried.phase(), BuildPhase::Initialization);
        let recovery = retried.status.failure.unwrap().recovery;
        assert_eq!(recovery.attempt, 1);
        assert_eq!(recovery.attempt_time, Some(clock.now()));
    }

    #[tokio::test]
    async fn test_backoff_measured_from_last_attempt() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let action = action(&clock);
        let mut build = action.handle(failed_build()).await.unwrap().unwrap();
        if let Some(failure) = build.status.failure.as_mut() {
            failure.recovery.attempt = 2;
            failure.recovery.attempt_time = Some(clock.now());
        }

        clock.advance_secs(19);
        assert!(action.handle(build.clone()).await.unwrap().is_none());
        clock.advance_secs(1);
        assert_eq!(
            action.handle(build).await.unwrap().unwrap().phase(),
            BuildPhase::Initialization
        );
    }

    #[tokio::test]
    async fn test_exhausted_goes_to_error_regardless_of_time() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let action = action(&clock);
        let mut build = action.handle(failed_build()).await.unwrap().unwrap();
        if let Some(failure) = build.status.failure.as_mut() {
            failure.recovery.attempt = 5;
            failure.recovery.attempt_time = Some(clock.now());
        }

        assert_eq!(action.state(&build), RecoveryState::Exhausted);
        let frozen = action.handle(build).await.unwrap().unwrap();
        assert_eq!(frozen.phase(), BuildPhase::Error);
        assert!(frozen.status.error.is_none());
        assert_eq!(frozen.status.failure.unwrap().reason, "exit code 1");
    }

    #[test]
    fn test_only_handles_failed() {
        let action = action(&Arc::new(ManualClock::default()));
        let mut build = failed_build();
        assert!(action.can_handle(&build));
        build.status.phase = BuildPhase::Error;
        assert!(!action.can_handle(&build));
    }
}
