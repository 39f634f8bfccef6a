//! Pod executor strategy: runs the image builder as a cluster workload.

use super::{generation_name, ExecutionObservation, ExecutionStrategy};
use crate::core::{
    BuildStrategy, ContainerBuild, ExecutionHandle, ObjectKey, OwnerReference, PublishStrategy,
    ResourceRequirements,
};
use crate::errors::{BuildflowError, Result};
use crate::utils::validate_label_name;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Label carrying the build name on every workload.
pub const LABEL_BUILD: &str = "buildflow.io/build";
/// Label carrying the execution generation.
pub const LABEL_GENERATION: &str = "buildflow.io/generation";
/// Label carrying a digest of the build context.
pub const LABEL_CONTEXT_DIGEST: &str = "buildflow.io/context-digest";

/// Settings for the executor workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Image-builder executor image.
    #[serde(default = "default_image")]
    pub image: String,
    /// Directory the build context is mounted at inside the workload.
    #[serde(default = "default_context_dir")]
    pub context_dir: String,
    /// Name of the resource used as the build definition file.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
}

fn default_image() -> String {
    "gcr.io/kaniko-project/executor:v1.9.0".to_string()
}

fn default_context_dir() -> String {
    "/workspace".to_string()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            context_dir: default_context_dir(),
            dockerfile: default_dockerfile(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the executor image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

/// The build context handed to the workload: every resource, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// File name to base64 content.
    pub files: BTreeMap<String, String>,
    /// Truncated sha256 over names and contents.
    pub digest: String,
}

impl BuildContext {
    /// Encodes a resource map.
    #[must_use]
    pub fn from_resources(resources: &BTreeMap<String, Vec<u8>>) -> Self {
        let mut hasher = Sha256::new();
        let mut files = BTreeMap::new();
        for (name, content) in resources {
            hasher.update(name.as_bytes());
            hasher.update((content.len() as u64).to_be_bytes());
            hasher.update(content);
            files.insert(name.clone(), STANDARD.encode(content));
        }
        let result = hasher.finalize();
        Self {
            files,
            digest: hex::encode(&result[..16]),
        }
    }
}

/// Everything the executor needs to start one build workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Namespace and name of the workload.
    pub key: ObjectKey,
    /// Parent-link to the build.
    pub owner: OwnerReference,
    /// Executor image.
    pub image: String,
    /// Executor arguments.
    pub args: Vec<String>,
    /// Build context files.
    pub context: BuildContext,
    /// Mount path of the context.
    pub context_dir: String,
    /// Compute resources.
    pub resources: ResourceRequirements,
    /// Registry credentials secret to mount.
    pub registry_secret: Option<String>,
    /// Labels.
    pub labels: BTreeMap<String, String>,
}

impl WorkloadSpec {
    /// Builds the workload for the build's current generation.
    #[must_use]
    pub fn for_build(build: &ContainerBuild, name: String, config: &ExecutorConfig) -> Self {
        let context = BuildContext::from_resources(&build.spec.resources);

        let mut labels = BTreeMap::new();
        labels.insert(LABEL_BUILD.to_string(), build.key.name.clone());
        labels.insert(LABEL_GENERATION.to_string(), build.status.generation.to_string());
        labels.insert(LABEL_CONTEXT_DIGEST.to_string(), context.digest.clone());

        Self {
            key: ObjectKey::new(&build.key.namespace, name),
            owner: build.owner_reference(),
            image: config.image.clone(),
            args: executor_args(build, config),
            context,
            context_dir: config.context_dir.clone(),
            resources: build.spec.resource_requirements.clone(),
            registry_secret: build.spec.registry.secret.clone(),
            labels,
        }
    }
}

/// Kaniko arguments for a build, followed by the build's own extra arguments.
#[must_use]
pub fn executor_args(build: &ContainerBuild, config: &ExecutorConfig) -> Vec<String> {
    let mut args = vec![
        format!("--dockerfile={}", config.dockerfile),
        format!("--context=dir://{}", config.context_dir),
    ];

    match build.spec.registry.image_reference(&build.spec.image_name) {
        Some(destination) => args.push(format!("--destination={destination}")),
        None => args.push("--no-push".to_string()),
    }

    if build.spec.registry.insecure {
        args.push("--insecure".to_string());
        args.push("--insecure-pull".to_string());
        args.push("--skip-tls-verify".to_string());
    }

    args.extend(build.spec.additional_args.iter().cloned());
    args
}

/// Phase reported by the workload executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    /// Waiting to be started.
    Pending,
    /// Running.
    Running,
    /// Exited successfully.
    Succeeded,
    /// Exited with an error.
    Failed,
}

/// State of a workload as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStatus {
    /// Phase.
    pub phase: WorkloadPhase,
    /// Termination message, if any.
    pub message: Option<String>,
}

/// External workload executor.
#[async_trait]
pub trait WorkloadExecutor: Send + Sync + Debug {
    /// Creates the workload. Fails with `AlreadyExists` if it exists.
    async fn create_workload(&self, spec: WorkloadSpec) -> Result<()>;

    /// Looks up a workload; `None` if it does not exist.
    async fn get_workload(&self, key: &ObjectKey) -> Result<Option<WorkloadStatus>>;
}

/// Strategy that launches one executor workload per build generation.
#[derive(Debug, Clone)]
pub struct PodExecutorStrategy {
    executor: Arc<dyn WorkloadExecutor>,
    config: ExecutorConfig,
}

impl PodExecutorStrategy {
    /// Workload name suffix.
    pub const SUFFIX: &'static str = "builder";

    /// Creates the strategy.
    #[must_use]
    pub fn new(executor: Arc<dyn WorkloadExecutor>, config: ExecutorConfig) -> Self {
        Self { executor, config }
    }
}

#[async_trait]
impl ExecutionStrategy for PodExecutorStrategy {
    fn kind(&self) -> BuildStrategy {
        BuildStrategy::PodExecutor
    }

    async fn prepare(&self, build: &ContainerBuild) -> Result<()> {
        if build.spec.publish_strategy != PublishStrategy::Kaniko {
            return Err(BuildflowError::Configuration(format!(
                "the {} strategy cannot publish with {}",
                self.kind(),
                build.spec.publish_strategy
            )));
        }
        if !build.spec.resources.contains_key(&self.config.dockerfile) {
            return Err(BuildflowError::Configuration(format!(
                "build {} has no '{}' resource",
                build.key, self.config.dockerfile
            )));
        }
        validate_label_name(&generation_name(build, Self::SUFFIX))
    }

    async fn launch(&self, build: &ContainerBuild) -> Result<ExecutionHandle> {
        let name = generation_name(build, Self::SUFFIX);
        validate_label_name(&name)?;

        let spec = WorkloadSpec::for_build(build, name.clone(), &self.config);
        match self.executor.create_workload(spec).await {
            Ok(()) => info!(build = %build.key, workload = %name, "Launched build workload"),
            Err(err) if err.is_already_exists() => {
                debug!(build = %build.key, workload = %name, "Build workload already exists");
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
        let observation = match self.executor.get_workload(&key).await? {
            None => ExecutionObservation::Missing,
            Some(status) => match status.phase {
                WorkloadPhase::Pending => ExecutionObservation::Pending,
                WorkloadPhase::Running => ExecutionObservation::Running,
                WorkloadPhase::Succeeded => ExecutionObservation::Succeeded,
                WorkloadPhase::Failed => ExecutionObservation::Failed(
                    status
                        .message
                        .unwrap_or_else(|| format!("build workload {} failed", handle.name)),
                ),
            },
        };
        Ok(observation)
    }
}
