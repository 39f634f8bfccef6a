//! Build manager: the operations an outer reconcile loop calls.
//!
//! The manager is the only component that reads and writes build records.
//! Actions work on owned copies; the manager decides what gets persisted and
//! emits a [`BuildEvent`] for every persisted phase change.

mod controller;

use crate::actions::RecoveryState;
use crate::core::{BuildEvent, BuildPhase, ContainerBuild, ObjectKey, WorkflowRef};
use crate::errors::{BuildflowError, Result};
use crate::events::EventSink;
use crate::pipeline::{ActionPipeline, RecoveryPolicy, TickOutcome};
use crate::store::{BuildStore, PlatformLookup};
use crate::strategy::ExecutionStrategies;
use crate::utils::{validate_build_name, Clock};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub use controller::{BuildReconciler, ReconcileResult, RequeueConfig};

/// Drives build records through their lifecycle.
pub struct BuildManager {
    store: Arc<dyn BuildStore>,
    platforms: Arc<dyn PlatformLookup>,
    strategies: ExecutionStrategies,
    pipeline: ActionPipeline,
    policy: RecoveryPolicy,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for BuildManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildManager")
            .field("store", &self.store)
            .field("platforms", &self.platforms)
            .field("pipeline", &self.pipeline.action_names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl BuildManager {
    /// Creates a manager running the standard action pipeline.
    #[must_use]
    pub fn new(
        store: Arc<dyn BuildStore>,
        platforms: Arc<dyn PlatformLookup>,
        strategies: ExecutionStrategies,
        policy: RecoveryPolicy,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pipeline = ActionPipeline::standard(strategies.clone(), policy.clone(), clock.clone());
        Self {
            store,
            platforms,
            strategies,
            pipeline,
            policy,
            events,
            clock,
        }
    }

    /// Replaces the action pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: ActionPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Returns the recovery policy.
    #[must_use]
    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    /// Reads a build record.
    pub async fn get_build(&self, key: &ObjectKey) -> Result<ContainerBuild> {
        self.store.get(key).await
    }

    /// Returns the retry state of a failed build at the current time.
    #[must_use]
    pub fn recovery_state(&self, build: &ContainerBuild) -> RecoveryState {
        RecoveryState::evaluate(build, &self.policy, self.clock.now())
    }

    /// Returns the build for a workflow, creating it from the namespace's
    /// active platform if it does not exist yet.
    pub async fn get_or_create_build(&self, workflow: &WorkflowRef) -> Result<ContainerBuild> {
        match self.store.get(&workflow.key).await {
            Ok(build) => return Ok(build),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        validate_build_name(&workflow.key.name)?;
        let platform = self
            .platforms
            .active_platform(&workflow.key.namespace)
            .await?
            .ok_or_else(|| BuildflowError::PlatformNotFound {
                namespace: workflow.key.namespace.clone(),
            })?;

        let build = ContainerBuild::for_workflow(workflow, &platform);
        match self.store.create(build).await {
            Ok(created) => {
                info!(
                    build = %created.key,
                    platform = %platform.name,
                    strategy = %created.spec.strategy,
                    "Created build"
                );
                Ok(created)
            }
            Err(err) if err.is_already_exists() => {
                debug!(build = %workflow.key, "Build created concurrently, re-reading");
                self.store.get(&workflow.key).await
            }
            Err(err) => Err(err),
        }
    }

    /// Resets a build so that the next schedule starts it over with a fresh
    /// retry budget.
    pub async fn mark_to_restart(&self, build: &mut ContainerBuild) -> Result<()> {
        let mut next = build.clone();
        next.status.phase = BuildPhase::None;
        next.status.failure = None;
        next.status.error = None;
        next.status.execution = None;
        next.status.launched_at = None;

        info!(build = %build.key, from = %build.phase(), "Marking build to restart");
        *build = self.persist(build.phase(), next).await?;
        Ok(())
    }

    /// Prepares a new build on its execution strategy and hands it to the
    /// pipeline. Only valid in phase `None`.
    pub async fn schedule(&self, build: &mut ContainerBuild) -> Result<()> {
        if build.phase() != BuildPhase::None {
            return Err(BuildflowError::InvalidPhase {
                key: build.key.clone(),
                expected: BuildPhase::None.to_string(),
                actual: build.phase(),
            });
        }

        let strategy = self.strategies.for_build(build)?;
        strategy.prepare(build).await?;

        let mut next = build.clone();
        next.status.phase = BuildPhase::Initialization;
        info!(build = %build.key, strategy = %strategy.kind(), "Scheduled build");
        *build = self.persist(build.phase(), next).await?;
        Ok(())
    }

    /// Runs one pipeline pass and persists the result if the status changed.
    ///
    /// Terminal builds are left alone. Builds that were never scheduled are
    /// rejected.
    pub async fn reconcile(&self, build: &mut ContainerBuild) -> Result<TickOutcome> {
        let phase = build.phase();
        if phase == BuildPhase::None {
            return Err(BuildflowError::InvalidPhase {
                key: build.key.clone(),
                expected: "a scheduled phase".to_string(),
                actual: phase,
            });
        }
        if phase.is_terminal() {
            debug!(build = %build.key, %phase, "Build is terminal, nothing to reconcile");
            return Ok(TickOutcome::Idle);
        }

        let outcome = self.pipeline.run(build).await?;
        if let TickOutcome::Handled { build: updated, .. } = &outcome {
            if updated.status != build.status {
                *build = self.persist(phase, updated.clone()).await?;
            }
        }
        Ok(outcome)
    }

    async fn persist(&self, previous: BuildPhase, build: ContainerBuild) -> Result<ContainerBuild> {
        let stored = self.store.update_status(&build).await?;
        if stored.phase() != previous {
            self.events
                .emit(BuildEvent::phase_updated(
                    stored.key.clone(),
                    stored.phase(),
                    self.clock.now(),
                ))
                .await;
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::store::{InMemoryBuildStore, InMemoryPlatformLookup};
    use crate::strategy::{ExecutorConfig, PodExecutorStrategy};
    use crate::testing::{sample_platform, sample_workflow, FakeWorkloadExecutor};
    use crate::utils::ManualClock;
    use pretty_assertions::assert_eq;

    fn manager(lookup: InMemoryPlatformLookup) -> (BuildManager, Arc<CollectingEventSink>) {
        let events = Arc::new(CollectingEventSink::new());
        let pod = Arc::new(PodExecutorStrategy::new(
            Arc::new(FakeWorkloadExecutor::new()),
            ExecutorConfig::default(),
        ));
        let manager = BuildManager::new(
            Arc::new(InMemoryBuildStore::new()),
            Arc::new(lookup),
            ExecutionStrategies::new(pod),
            RecoveryPolicy::default(),
            events.clone(),
            Arc::new(ManualClock::default()),
        );
        (manager, events)
    }

    #[tokio::test]
    async fn test_get_or_create_without_platform() {
        let (manager, _) = manager(InMemoryPlatformLookup::new());
        let err = manager
            .get_or_create_build(&sample_workflow("greetings"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildflowError::PlatformNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_or_create_rejects_invalid_name() {
        let lookup = InMemoryPlatformLookup::new().with_platform("default", sample_platform());
        let (manager, _) = manager(lookup);
        let err = manager
            .get_or_create_build(&sample_workflow("Not_Valid"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildflowError::Validation(_)));

        let err = manager
            .get_or_create_build(&sample_workflow("my-flow.v2"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_schedule_requires_none_phase() {
        let lookup = InMemoryPlatformLookup::new().with_platform("default", sample_platform());
        let (manager, events) = manager(lookup);
        let mut build = manager
            .get_or_create_build(&sample_workflow("greetings"))
            .await
            .unwrap();

        manager.schedule(&mut build).await.unwrap();
        assert_eq!(build.phase(), BuildPhase::Initialization);
        assert_eq!(events.messages(), vec!["Updated buildphase to Initialization"]);

        let err = manager.schedule(&mut build).await.unwrap_err();
        assert!(matches!(err, BuildflowError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_rejects_unscheduled_build() {
        let lookup = InMemoryPlatformLookup::new().with_platform("default", sample_platform());
        let (manager, _) = manager(lookup);
        let mut build = manager
            .get_or_create_build(&sample_workflow("greetings"))
            .await
            .unwrap();

        let err = manager.reconcile(&mut build).await.unwrap_err();
        assert!(matches!(err, BuildflowError::InvalidPhase { .. }));
    }
}
