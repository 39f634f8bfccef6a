use super::Action;
use crate::core::{BuildPhase, ContainerBuild};
use crate::errors::{BuildflowError, Result};
use crate::strategy::ExecutionStrategies;
use crate::utils::Clock;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Launches the current generation on the build's execution strategy.
#[derive(Debug, Clone)]
pub struct ScheduleAction {
    strategies: ExecutionStrategies,
    clock: Arc<dyn Clock>,
}

impl ScheduleAction {
    /// Creates the action.
    #[must_use]
    pub fn new(strategies: ExecutionStrategies, clock: Arc<dyn Clock>) -> Self {
        Self { strategies, clock }
    }
}

#[async_trait]
impl Action for ScheduleAction {
    fn name(&self) -> &str {
        "schedule"
    }

    fn can_handle(&self, build: &ContainerBuild) -> bool {
        build.phase() == BuildPhase::Scheduling
    }

    async fn handle(&self, mut build: ContainerBuild) -> Result<Option<ContainerBuild>> {
        let strategy = self.strategies.for_build(&build)?;
        let handle = match strategy.launch(&build).await {
            Ok(handle) => handle,
            Err(BuildflowError::Validation(reason)) => {
                warn!(build = %build.key, %reason, "Build cannot be launched");
                build.status.error = Some(reason);
                build.status.phase = BuildPhase::Failed;
                return Ok(Some(build));
            }
            Err(err) => return Err(err),
        };

        info!(
            build = %build.key,
            strategy = %strategy.kind(),
            execution = %handle.name,
            "Launched build"
        );

        build.status.execution = Some(handle);
        build.status.launched_at = Some(self.clock.now());
        build.status.phase = BuildPhase::Pending;
        Ok(Some(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildStrategy, ExecutionHandle};
    use crate::strategy::{
        ExecutionObservation, ExecutionStrategy, ExecutorConfig, PodExecutorStrategy,
    };
    use crate::testing::{sample_build, FakeWorkloadExecutor};
    use crate::utils::ManualClock;
    use chrono::Utc;

    fn action(executor: &Arc<FakeWorkloadExecutor>, clock: &Arc<ManualClock>) -> ScheduleAction {
        let pod = Arc::new(PodExecutorStrategy::new(
            executor.clone(),
            ExecutorConfig::default(),
        ));
        ScheduleAction::new(ExecutionStrategies::new(pod), clock.clone())
    }

    #[tokio::test]
    async fn test_schedule_launches_and_moves_to_pending() {
        let executor = Arc::new(FakeWorkloadExecutor::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut build = sample_build("greetings");
        build.status.phase = BuildPhase::Scheduling;
        build.status.generation = 1;

        let updated = action(&executor, &clock)
            .handle(build)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.phase(), BuildPhase::Pending);
        assert_eq!(updated.status.launched_at, Some(clock.now()));
        assert_eq!(
            updated.status.execution.map(|h| h.name),
            Some("greetings-builder-1".to_string())
        );
        assert_eq!(executor.created().len(), 1);
    }

    #[derive(Debug)]
    struct RejectingStrategy;

    #[async_trait]
    impl ExecutionStrategy for RejectingStrategy {
        fn kind(&self) -> BuildStrategy {
            BuildStrategy::PodExecutor
        }

        async fn prepare(&self, _build: &ContainerBuild) -> Result<()> {
            Ok(())
        }

        async fn launch(&self, _build: &ContainerBuild) -> Result<ExecutionHandle> {
            Err(BuildflowError::Validation("name is not a valid label".into()))
        }

        async fn observe(
            &self,
            _build: &ContainerBuild,
            _handle: &ExecutionHandle,
        ) -> Result<ExecutionObservation> {
            Ok(ExecutionObservation::Missing)
        }
    }

    #[tokio::test]
    async fn test_invalid_launch_name_fails_the_build() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let action = ScheduleAction::new(
            ExecutionStrategies::new(Arc::new(RejectingStrategy)),
            clock,
        );
        let mut build = sample_build("greetings");
        build.status.phase = BuildPhase::Scheduling;

        let updated = action.handle(build).await.unwrap().unwrap();
        assert_eq!(updated.phase(), BuildPhase::Failed);
        assert_eq!(updated.status.error.as_deref(), Some("name is not a valid label"));
        assert!(updated.status.execution.is_none());
    }

    #[tokio::test]
    async fn test_long_name_launches_shortened_workload() {
        let executor = Arc::new(FakeWorkloadExecutor::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut build = sample_build(&"a".repeat(60));
        build.status.phase = BuildPhase::Scheduling;
        build.status.generation = 100;

        let updated = action(&executor, &clock)
            .handle(build)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.phase(), BuildPhase::Pending);
        let name = updated.status.execution.unwrap().name;
        assert!(name.len() <= 63, "{name}");
        assert!(name.ends_with("-builder-100"));
    }

    #[tokio::test]
    async fn test_schedule_failure_leaves_no_partial_state() {
        let executor = Arc::new(FakeWorkloadExecutor::new());
        executor.fail_next("connection reset");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut build = sample_build("greetings");
        build.status.phase = BuildPhase::Scheduling;

        let result = action(&executor, &clock).handle(build.clone()).await;
        assert!(result.is_err());
        assert_eq!(build.phase(), BuildPhase::Scheduling);
        assert!(build.status.execution.is_none());
    }
}
