use super::Action;
use crate::core::{BuildPhase, ContainerBuild};
use crate::errors::Result;
use async_trait::async_trait;
use tracing::info;

/// Opens a new execution generation and hands the build to scheduling.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitializeAction;

impl InitializeAction {
    /// Creates the action.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Action for InitializeAction {
    fn name(&self) -> &str {
        "initialize"
    }

    fn can_handle(&self, build: &ContainerBuild) -> bool {
        build.phase() == BuildPhase::Initialization
    }

    async fn handle(&self, mut build: ContainerBuild) -> Result<Option<ContainerBuild>> {
        build.status.error = None;
        build.status.execution = None;
        build.status.launched_at = None;
        build.status.generation += 1;
        build.status.phase = BuildPhase::Scheduling;

        info!(
            build = %build.key,
            generation = build.status.generation,
            "Initialized build generation"
        );
        Ok(Some(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildStrategy, ExecutionHandle};
    use crate::testing::sample_build;

    #[tokio::test]
    async fn test_initialize_opens_new_generation() {
        let mut build = sample_build("greetings");
        build.status.phase = BuildPhase::Initialization;
        build.status.generation = 2;
        build.status.error = Some("exit code 1".into());
        build.status.execution = Some(ExecutionHandle::new(
            BuildStrategy::PodExecutor,
            "greetings-builder-2",
        ));

        let updated = InitializeAction::new().handle(build).await.unwrap().unwrap();

        assert_eq!(updated.phase(), BuildPhase::Scheduling);
        assert_eq!(updated.status.generation, 3);
        assert!(updated.status.error.is_none());
        assert!(updated.status.execution.is_none());
    }

    #[test]
    fn test_only_handles_initialization() {
        let action = InitializeAction::new();
        let mut build = sample_build("greetings");
        assert!(!action.can_handle(&build));
        build.status.phase = BuildPhase::Initialization;
        assert!(action.can_handle(&build));
    }
}
