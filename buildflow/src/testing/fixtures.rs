//! Sample records and a fully wired engine for tests and benchmarks.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::config::BuildflowConfig;
use crate::core::{
    BuildSpec, BuildStrategy, BuildTemplate, ContainerBuild, ObjectKey, Platform, PublishStrategy,
    RegistrySpec, WorkflowRef,
};
use crate::events::CollectingEventSink;
use crate::manager::{BuildManager, BuildReconciler};
use crate::store::{InMemoryBuildStore, InMemoryPlatformLookup};
use crate::strategy::{ExecutionStrategies, PlatformNativeStrategy, PodExecutorStrategy};
use crate::utils::ManualClock;

use super::{FakePlatformBuildService, FakeWorkloadExecutor};

/// Namespace used by every fixture.
pub const TEST_NAMESPACE: &str = "default";

/// A pod-executor build with a one-line Dockerfile, not yet scheduled.
#[must_use]
pub fn sample_build(name: &str) -> ContainerBuild {
    let spec = BuildSpec {
        strategy: BuildStrategy::PodExecutor,
        publish_strategy: PublishStrategy::Kaniko,
        registry: RegistrySpec::new("registry.local:5000"),
        image_name: format!("{name}:latest"),
        resources: [("Dockerfile".to_string(), b"FROM scratch".to_vec())]
            .into_iter()
            .collect(),
        ..BuildSpec::default()
    };
    ContainerBuild::new(ObjectKey::new(TEST_NAMESPACE, name), spec)
}

/// A pod-executor platform publishing with Kaniko.
#[must_use]
pub fn sample_platform() -> Platform {
    Platform {
        name: "kaniko-platform".to_string(),
        build_template: BuildTemplate::default().with_resource("Dockerfile", "FROM scratch"),
        registry: RegistrySpec::new("registry.local:5000"),
        build_strategy: BuildStrategy::PodExecutor,
        publish_strategy: PublishStrategy::Kaniko,
    }
}

/// A workflow in the test namespace.
#[must_use]
pub fn sample_workflow(name: &str) -> WorkflowRef {
    WorkflowRef::new(TEST_NAMESPACE, name, Uuid::new_v4())
}

/// An engine wired to in-memory collaborators and a manual clock.
///
/// The test namespace has [`sample_platform`] active.
#[derive(Debug)]
pub struct TestHarness {
    /// Build records.
    pub store: Arc<InMemoryBuildStore>,
    /// Active platforms.
    pub platforms: Arc<InMemoryPlatformLookup>,
    /// Pod executor backend.
    pub executor: Arc<FakeWorkloadExecutor>,
    /// Platform-native backend.
    pub platform_service: Arc<FakePlatformBuildService>,
    /// Emitted events.
    pub events: Arc<CollectingEventSink>,
    /// Time source shared by every action.
    pub clock: Arc<ManualClock>,
    /// The manager under test.
    pub manager: Arc<BuildManager>,
    /// Reconciler around `manager`.
    pub reconciler: BuildReconciler,
}

impl TestHarness {
    /// Creates a harness with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&BuildflowConfig::default())
    }

    /// Creates a harness from `config`.
    #[must_use]
    pub fn with_config(config: &BuildflowConfig) -> Self {
        let store = Arc::new(InMemoryBuildStore::new());
        let platforms = Arc::new(InMemoryPlatformLookup::new());
        platforms.insert(TEST_NAMESPACE, sample_platform());
        let executor = Arc::new(FakeWorkloadExecutor::new());
        let platform_service = Arc::new(FakePlatformBuildService::new());
        let events = Arc::new(CollectingEventSink::new());
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let clock = Arc::new(ManualClock::new(start));

        let strategies = ExecutionStrategies::new(Arc::new(PodExecutorStrategy::new(
            executor.clone(),
            config.executor.clone(),
        )))
        .with_platform(Arc::new(PlatformNativeStrategy::new(platform_service.clone())));

        let manager = Arc::new(BuildManager::new(
            store.clone(),
            platforms.clone(),
            strategies,
            config.recovery.clone(),
            events.clone(),
            clock.clone(),
        ));
        let reconciler = BuildReconciler::new(manager.clone(), config.requeue.clone());

        Self {
            store,
            platforms,
            executor,
            platform_service,
            events,
            clock,
            manager,
            reconciler,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
