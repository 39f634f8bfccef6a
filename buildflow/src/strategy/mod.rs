//! Execution strategies: the interchangeable backends that perform the build.
//!
//! A strategy is chosen once per build from `spec.strategy` and never
//! switched. Pipeline actions call into it through [`ExecutionStrategies`]
//! without knowing which variant is behind it.

pub mod platform;
pub mod pod;

use crate::core::{BuildStrategy, ContainerBuild, ExecutionHandle};
use crate::errors::{BuildflowError, Result};
use crate::utils::validation::MAX_LABEL_LENGTH;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug};
use std::sync::Arc;

pub use platform::{
    BuildConfigSpec, ImageStreamSpec, PlatformBuildPhase, PlatformBuildService,
    PlatformBuildStatus, PlatformNativeStrategy,
};
pub use pod::{
    BuildContext, ExecutorConfig, PodExecutorStrategy, WorkloadExecutor, WorkloadPhase,
    WorkloadSpec, WorkloadStatus,
};

/// What the backend reports about the current generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionObservation {
    /// The backend object does not exist.
    Missing,
    /// Accepted but not started.
    Pending,
    /// Running.
    Running,
    /// Finished and published.
    Succeeded,
    /// Finished with an error.
    Failed(String),
}

impl fmt::Display for ExecutionObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// A backend that builds and publishes an image.
///
/// Every method is a trigger or a lookup; none waits for the build itself.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync + Debug {
    /// The selector value this strategy serves.
    fn kind(&self) -> BuildStrategy;

    /// Creates whatever the strategy needs before the first launch.
    /// Called once when the build is scheduled; must be idempotent.
    async fn prepare(&self, build: &ContainerBuild) -> Result<()>;

    /// Starts the build's current generation. Launching a generation that
    /// already exists returns the same handle.
    async fn launch(&self, build: &ContainerBuild) -> Result<ExecutionHandle>;

    /// Reports the state of a launched generation.
    async fn observe(
        &self,
        build: &ContainerBuild,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionObservation>;
}

/// Bytes of the name digest kept in shortened backend names.
const NAME_DIGEST_BYTES: usize = 4;

/// Returns the deterministic backend object name for a build generation.
///
/// Names that would not fit a DNS-1123 label keep a prefix of the build
/// name followed by a short digest of the full name, so every generation of
/// a long-named build still gets a distinct, stable name.
#[must_use]
pub fn generation_name(build: &ContainerBuild, suffix: &str) -> String {
    let name = &build.key.name;
    let full = format!("{name}-{suffix}-{}", build.status.generation);
    if full.len() <= MAX_LABEL_LENGTH {
        return full;
    }

    let digest = Sha256::digest(name.as_bytes());
    let tail = format!(
        "-{}-{suffix}-{}",
        hex::encode(&digest[..NAME_DIGEST_BYTES]),
        build.status.generation
    );
    let keep = MAX_LABEL_LENGTH.saturating_sub(tail.len());
    let prefix: String = name.chars().take(keep).collect();
    format!("{}{tail}", prefix.trim_end_matches(['-', '.']))
}


/// The strategies available to the engine, one per selector value.
#[derive(Debug, Clone)]
pub struct ExecutionStrategies {
    pod: Arc<dyn ExecutionStrategy>,
    platform: Option<Arc<dyn ExecutionStrategy>>,
}

impl ExecutionStrategies {
    /// Creates a set with only the pod executor available.
    #[must_use]
    pub fn new(pod: Arc<dyn ExecutionStrategy>) -> Self {
        Self {
            pod,
            platform: None,
        }
    }

    /// Makes the platform-native strategy available.
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn ExecutionStrategy>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Returns the strategy selected by the build's spec.
    pub fn for_build(&self, build: &ContainerBuild) -> Result<&Arc<dyn ExecutionStrategy>> {
        match build.spec.strategy {
            BuildStrategy::PodExecutor => Ok(&self.pod),
            BuildStrategy::PlatformNative => self.platform.as_ref().ok_or_else(|| {
                BuildflowError::Configuration(format!(
                    "build {} requests the {} strategy, which is not available on this cluster",
                    build.key,
                    BuildStrategy::PlatformNative
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_build, FakePlatformBuildService, FakeWorkloadExecutor};

    fn pod() -> Arc<dyn ExecutionStrategy> {
        Arc::new(PodExecutorStrategy::new(
            Arc::new(FakeWorkloadExecutor::new()),
            ExecutorConfig::default(),
        ))
    }

    #[test]
    fn test_selects_pod_strategy() {
        let strategies = ExecutionStrategies::new(pod());
        let build = sample_build("greetings");
        let selected = strategies.for_build(&build).unwrap();
        assert_eq!(selected.kind(), BuildStrategy::PodExecutor);
    }

    #[test]
    fn test_platform_strategy_unavailable() {
        let strategies = ExecutionStrategies::new(pod());
        let mut build = sample_build("greetings");
        build.spec.strategy = BuildStrategy::PlatformNative;

        let err = strategies.for_build(&build).unwrap_err();
        assert!(matches!(err, BuildflowError::Configuration(_)));
    }

    #[test]
    fn test_selects_platform_strategy() {
        let platform: Arc<dyn ExecutionStrategy> = Arc::new(PlatformNativeStrategy::new(Arc::new(
            FakePlatformBuildService::new(),
        )));
        let strategies = ExecutionStrategies::new(pod()).with_platform(platform);
        let mut build = sample_build("greetings");
        build.spec.strategy = BuildStrategy::PlatformNative;

        assert_eq!(
            strategies.for_build(&build).unwrap().kind(),
            BuildStrategy::PlatformNative
        );
    }

    #[test]
    fn test_generation_name() {
        let mut build = sample_build("greetings");
        build.status.generation = 3;
        assert_eq!(generation_name(&build, "builder"), "greetings-builder-3");
    }

    #[test]
    fn test_generation_name_shortens_long_names() {
        let mut build = sample_build(&"a".repeat(60));
        build.status.generation = 1;
        let first = generation_name(&build, "builder");
        build.status.generation = u64::MAX;
        let last = generation_name(&build, "builder");

        for name in [&first, &last] {
            assert!(name.len() <= MAX_LABEL_LENGTH, "{name}");
            crate::utils::validate_label_name(name).unwrap();
        }
        assert!(first.ends_with("-builder-1"));
        assert_ne!(first, last);

        let mut other = sample_build(&format!("{}b", "a".repeat(59)));
        other.status.generation = 1;
        assert_ne!(generation_name(&other, "builder"), first);
    }
}
