//! Platform-native strategy: delegates to the platform's build-and-publish service.

use super::{generation_name, ExecutionObservation, ExecutionStrategy};
use crate::core::{
    BuildStrategy, ContainerBuild, ExecutionHandle, ObjectKey, OwnerReference, PublishStrategy,
    ResourceRequirements,
};
use crate::errors::{BuildflowError, Result};
use crate::utils::validate_label_name;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

const BUILD_ARG_PREFIX: &str = "--build-arg=";

/// Image stream the platform publishes the build output to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStreamSpec {
    /// Namespace and name.
    pub key: ObjectKey,
    /// Parent-link to the build.
    pub owner: OwnerReference,
}

/// Reusable build definition registered with the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfigSpec {
    /// Namespace and name.
    pub key: ObjectKey,
    /// Parent-link to the build.
    pub owner: OwnerReference,
    /// Build definition file content.
    pub dockerfile: String,
    /// Remaining build inputs.
    pub sources: BTreeMap<String, Vec<u8>>,
    /// Build arguments extracted from `--build-arg=K=V` options.
    pub build_args: BTreeMap<String, String>,
    /// Output image stream tag.
    pub output: String,
    /// Compute resources.
    pub resources: ResourceRequirements,
    /// Build timeout in seconds.
    pub timeout_seconds: Option<u64>,
}

/// Phase of a platform build object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformBuildPhase {
    /// Created, not yet accepted.
    New,
    /// Waiting for resources.
    Pending,
    /// Running.
    Running,
    /// Finished and pushed.
    Complete,
    /// The build itself failed.
    Failed,
    /// The platform could not run the build.
    Error,
    /// Cancelled by someone else.
    Cancelled,
}

/// State of a platform build object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformBuildStatus {
    /// Phase.
    pub phase: PlatformBuildPhase,
    /// Status message, if any.
    pub message: Option<String>,
}

/// External platform build service.
#[async_trait]
pub trait PlatformBuildService: Send + Sync + Debug {
    /// Creates or updates the image stream.
    async fn ensure_image_stream(&self, spec: ImageStreamSpec) -> Result<()>;

    /// Creates or updates the build config.
    async fn ensure_build_config(&self, spec: BuildConfigSpec) -> Result<()>;

    /// Starts a build named `build_name` from a build config. Fails with
    /// `AlreadyExists` if that build was already started.
    async fn instantiate_build(&self, config: &ObjectKey, build_name: &str) -> Result<()>;

    /// Looks up a build; `None` if it does not exist.
    async fn get_build(&self, key: &ObjectKey) -> Result<Option<PlatformBuildStatus>>;
}

/// Splits executor-style options into platform build arguments.
///
/// Only `--build-arg=KEY=VALUE` has a platform equivalent; other options are
/// returned separately so the caller can report them.
#[must_use]
pub fn split_build_args(args: &[String]) -> (BTreeMap<String, String>, Vec<String>) {
    let mut build_args = BTreeMap::new();
    let mut ignored = Vec::new();
    for arg in args {
        match arg
            .strip_prefix(BUILD_ARG_PREFIX)
            .and_then(|kv| kv.split_once('='))
        {
            Some((key, value)) if !key.is_empty() => {
                build_args.insert(key.to_string(), value.to_string());
            }
            _ => ignored.push(arg.clone()),
        }
    }
    (build_args, ignored)
}

/// Strategy that drives one platform build per build generation.
#[derive(Debug, Clone)]
pub struct PlatformNativeStrategy {
    service: Arc<dyn PlatformBuildService>,
    dockerfile: String,
}

impl PlatformNativeStrategy {
    /// Build object name suffix.
    pub const SUFFIX: &'static str = "build";

    /// Creates the strategy.
    #[must_use]
    pub fn new(service: Arc<dyn PlatformBuildService>) -> Self {
        Self {
            service,
            dockerfile: "Dockerfile".to_string(),
        }
    }

    /// Uses a different resource as the build definition file.
    #[must_use]
    pub fn with_dockerfile(mut self, name: impl Into<String>) -> Self {
        self.dockerfile = name.into();
        self
    }

    fn build_config(&self, build: &ContainerBuild) -> Result<BuildConfigSpec> {
        let dockerfile = build.spec.resources.get(&self.dockerfile).ok_or_else(|| {
            BuildflowError::Configuration(format!(
                "build {} has no '{}' resource",
                build.key, self.dockerfile
            ))
        })?;

        let sources = build
            .spec
            .resources
            .iter()
            .filter(|(name, _)| **name != self.dockerfile)
            .map(|(name, content)| (name.clone(), content.clone()))
            .collect();

        let (build_args, ignored) = split_build_args(&build.spec.additional_args);
        if !ignored.is_empty() {
            debug!(build = %build.key, ?ignored, "Options without a platform equivalent");
        }

        Ok(BuildConfigSpec {
            key: build.key.clone(),
            owner: build.owner_reference(),
            dockerfile: String::from_utf8_lossy(dockerfile).into_owned(),
            sources,
            build_args,
            output: build.spec.image_name.clone(),
            resources: build.spec.resource_requirements.clone(),
            timeout_seconds: build.spec.timeout_seconds,
        })
    }
}

#[async_trait]
impl ExecutionStrategy for PlatformNativeStrategy {
    fn kind(&self) -> BuildStrategy {
        BuildStrategy::PlatformNative
    }

    async fn prepare(&self, build: &ContainerBuild) -> Result<()> {
        if build.spec.publish_strategy != PublishStrategy::PlatformBuild {
            return Err(BuildflowError::Configuration(format!(
                "the {} strategy cannot publish with {}",
                self.kind(),
                build.spec.publish_strategy
            )));
        }
        validate_label_name(&generation_name(build, Self::SUFFIX))?;
        let config = self.build_config(build)?;

        self.service
            .ensure_image_stream(ImageStreamSpec {
                key: build.key.clone(),
                owner: build.owner_reference(),
            })
            .await?;
        self.service.ensure_build_config(config).await?;

        info!(build = %build.key, "Prepared platform build config and image stream");
        Ok(())
    }

    async fn launch(&self, build: &ContainerBuild) -> Result<ExecutionHandle> {
        let name = generation_name(build, Self::SUFFIX);
        validate_label_name(&name)?;

        match self.service.instantiate_build(&build.key, &name).await {
            Ok(()) => info!(build = %build.key, platform_build = %name, "Started platform build"),
            Err(err) if err.is_already_exists() => {
                debug!(build = %build.key, platform_build = %name, "Platform build already started");
            }
            Err(err) => return Err(err),
        }

        Ok(ExecutionHandle::new(self.kind(), name))
    }

    async fn observe(
        &self,
        build: &ContainerBuild,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionObservation> {
        let key = ObjectKey::new(&build.key.namespace, &handle.name);
        let observation = match self.service.get_build(&key).await? {
            None => ExecutionObservation::Missing,
            Some(status) => match status.phase {
                PlatformBuildPhase::New | PlatformBuildPhase::Pending => {
                    ExecutionObservation::Pending
                }
                PlatformBuildPhase::Running => ExecutionObservation::Running,
                PlatformBuildPhase::Complete => ExecutionObservation::Succeeded,
                phase @ (PlatformBuildPhase::Failed
                | PlatformBuildPhase::Error
                | PlatformBuildPhase::Cancelled) => ExecutionObservation::Failed(
                    status
                        .message
                        .unwrap_or_else(|| format!("platform build {} ended as {phase:?}", handle.name)),
                ),
            },
        };
        Ok(observation)
    }
}
