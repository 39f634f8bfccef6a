use super::Action;
use crate::core::{BuildPhase, ContainerBuild};
use crate::errors::Result;
use crate::strategy::{ExecutionObservation, ExecutionStrategies};
use crate::utils::{elapsed_between, Clock};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Follows a launched build until the backend reports a final result.
#[derive(Debug, Clone)]
pub struct MonitorAction {
    strategies: ExecutionStrategies,
    clock: Arc<dyn Clock>,
}

impl MonitorAction {
    /// Creates the action.
    #[must_use]
    pub fn new(strategies: ExecutionStrategies, clock: Arc<dyn Clock>) -> Self {
        Self { strategies, clock }
    }

    fn timed_out(&self, build: &ContainerBuild) -> Option<u64> {
        let limit = build.spec.timeout_seconds?;
        let launched_at = build.status.launched_at?;
        let elapsed = elapsed_between(launched_at, self.clock.now());
        (elapsed > Duration::from_secs(limit)).then_some(limit)
    }
}

fn fail(mut build: ContainerBuild, reason: String) -> ContainerBuild {
    warn!(build = %build.key, reason = %reason, "Build failed");
    build.status.phase = BuildPhase::Failed;
    build.status.error = Some(reason);
    build
}

#[async_trait]
impl Action for MonitorAction {
    fn name(&self) -> &str {
        "monitor"
    }

    fn can_handle(&self, build: &ContainerBuild) -> bool {
        matches!(build.phase(), BuildPhase::Pending | BuildPhase::Running)
    }

    async fn handle(&self, mut build: ContainerBuild) -> Result<Option<ContainerBuild>> {
        let Some(handle) = build.status.execution.clone() else {
            let reason = format!(
                "no execution recorded for generation {}",
                build.status.generation
            );
            return Ok(Some(fail(build, reason)));
        };

        let strategy = self.strategies.for_build(&build)?;
        let observation = strategy.observe(&build, &handle).await?;
        debug!(build = %build.key, execution = %handle.name, %observation, "Observed execution");
        let started = observation == ExecutionObservation::Running;

        let next = match observation {
            ExecutionObservation::Succeeded => BuildPhase::Succeeded,
            ExecutionObservation::Failed(reason) => return Ok(Some(fail(build, reason))),
            ExecutionObservation::Missing => {
                let reason = format!("execution {} no longer exists", handle.name);
                return Ok(Some(fail(build, reason)));
            }
            ExecutionObservation::Pending | ExecutionObservation::Running => {
                if let Some(limit) = self.timed_out(&build) {
                    let reason = format!("build did not finish within {limit}s");
                    return Ok(Some(fail(build, reason)));
                }
                if started && build.phase() == BuildPhase::Pending {
                    BuildPhase::Running
                } else {
                    return Ok(None);
                }
            }
        };

        info!(build = %build.key, from = %build.phase(), to = %next, "Build progressed");
        build.status.phase = next;
        Ok(Some(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildStrategy, ExecutionHandle};
    use crate::strategy::{ExecutionStrategy, ExecutorConfig, PodExecutorStrategy, WorkloadPhase};
    use crate::testing::{sample_build, FakeWorkloadExecutor};
    use crate::utils::ManualClock;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    struct Harness {
        executor: Arc<FakeWorkloadExecutor>,
        clock: Arc<ManualClock>,
        action: MonitorAction,
        pod: Arc<PodExecutorStrategy>,
    }

    fn harness() -> Harness {
        let executor = Arc::new(FakeWorkloadExecutor::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let pod = Arc::new(PodExecutorStrategy::new(
            executor.clone(),
            ExecutorConfig::default(),
        ));
        let action = MonitorAction::new(ExecutionStrategies::new(pod.clone()), clock.clone());
        Harness {
            executor,
            clock,
            action,
            pod,
        }
    }

    async fn launched(h: &Harness) -> ContainerBuild {
        let mut build = sample_build("greetings");
        build.status.generation = 1;
        build.status.phase = BuildPhase::Pending;
        build.status.execution = Some(h.pod.launch(&build).await.unwrap());
        build.status.launched_at = Some(h.clock.now());
        build
    }

    #[tokio::test]
    async fn test_pending_without_progress_defers() {
        let h = harness();
        let build = launched(&h).await;
        assert!(h.action.handle(build).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_running_then_succeeded() {
        let h = harness();
        let build = launched(&h).await;
        let name = build.status.execution.clone().unwrap().name;

        h.executor.set_phase(&name, WorkloadPhase::Running, None);
        let running = h.action.handle(build).await.unwrap().unwrap();
        assert_eq!(running.phase(), BuildPhase::Running);

        assert!(h.action.handle(running.clone()).await.unwrap().is_none());

        h.executor.set_phase(&name, WorkloadPhase::Succeeded, None);
        let done = h.action.handle(running).await.unwrap().unwrap();
        assert_eq!(done.phase(), BuildPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_running_never_moves_back_to_pending() {
        let h = harness();
        let mut build = launched(&h).await;
        build.status.phase = BuildPhase::Running;
        assert!(h.action.handle(build).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_records_message() {
        let h = harness();
        let build = launched(&h).await;
        let name = build.status.execution.clone().unwrap().name;
        h.executor.set_phase(&name, WorkloadPhase::Failed, Some("exit code 1"));

        let failed = h.action.handle(build).await.unwrap().unwrap();
        assert_eq!(failed.phase(), BuildPhase::Failed);
        assert_eq!(failed.status.error.as_deref(), Some("exit code 1"));
    }

    #[tokio::test]
    async fn test_missing_execution_fails_build() {
        let h = harness();
        let mut build = launched(&h).await;
        build.status.execution = Some(ExecutionHandle::new(
            BuildStrategy::PodExecutor,
            "greetings-builder-7",
        ));
        let failed = h.action.handle(build).await.unwrap().unwrap();
        assert_eq!(failed.phase(), BuildPhase::Failed);

        let mut no_handle = launched(&h).await;
        no_handle.status.execution = None;
        let failed = h.action.handle(no_handle).await.unwrap().unwrap();
        assert_eq!(failed.phase(), BuildPhase::Failed);
    }

    #[tokio::test]
    async fn test_timeout_fails_build() {
        let h = harness();
        let mut build = launched(&h).await;
        build.spec.timeout_seconds = Some(60);

        h.clock.advance_secs(60);
        assert!(h.action.handle(build.clone()).await.unwrap().is_none());

        h.clock.advance_secs(1);
        let failed = h.action.handle(build).await.unwrap().unwrap();
        assert_eq!(failed.phase(), BuildPhase::Failed);
        assert_eq!(
            failed.status.error.as_deref(),
            Some("build did not finish within 60s")
        );
    }
}
