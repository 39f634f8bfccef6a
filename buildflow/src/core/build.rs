//! The container build record: identity, immutable spec and engine-owned status.

use super::{
    BuildPhase, BuildStrategy, ObjectKey, OwnerReference, Platform, PublishStrategy,
    RegistrySpec, ResourceRequirements, WorkflowRef,
};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// What to build and where to publish it. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Execution backend selector.
    #[serde(default)]
    pub strategy: BuildStrategy,
    /// Publish selector.
    #[serde(default)]
    pub publish_strategy: PublishStrategy,
    /// Registry target.
    #[serde(default)]
    pub registry: RegistrySpec,
    /// Name and tag of the produced image (e.g. "greetings:latest").
    pub image_name: String,
    /// Named byte-content inputs forming the build context.
    #[serde(default, with = "base64_map")]
    pub resources: BTreeMap<String, Vec<u8>>,
    /// Extra executor arguments, in order.
    #[serde(default)]
    pub additional_args: Vec<String>,
    /// Compute resources for the build.
    #[serde(default)]
    pub resource_requirements: ResourceRequirements,
    /// Build timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl BuildSpec {
    /// Builds a spec from the active platform's defaults.
    #[must_use]
    pub fn from_platform(platform: &Platform, image_name: impl Into<String>) -> Self {
        let template = &platform.build_template;
        Self {
            strategy: platform.build_strategy,
            publish_strategy: platform.publish_strategy,
            registry: platform.registry.clone(),
            image_name: image_name.into(),
            resources: template.resources.clone(),
            additional_args: template.additional_args.clone(),
            resource_requirements: template.resource_requirements.clone(),
            timeout_seconds: template.timeout_seconds,
        }
    }
}

/// Recovery bookkeeping for a failed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecovery {
    /// Retries performed so far.
    pub attempt: u32,
    /// Retries allowed before the build is frozen into `Error`.
    pub attempt_max: u32,
    /// When the last retry was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_time: Option<Timestamp>,
}

/// Failure record, created the first time a failure is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    /// Error message observed at the first failure.
    pub reason: String,
    /// When the failure was first observed.
    pub time: Timestamp,
    /// Retry state.
    pub recovery: FailureRecovery,
}

/// Reference to the backend object a strategy created for the current generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// The strategy that owns the object.
    pub strategy: BuildStrategy,
    /// Backend object name.
    pub name: String,
}

impl ExecutionHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(strategy: BuildStrategy, name: impl Into<String>) -> Self {
        Self {
            strategy,
            name: name.into(),
        }
    }
}

/// Engine-owned, mutable state of a build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: BuildPhase,
    /// Last observed failure message; cleared when a new generation starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure and retry record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<BuildFailure>,
    /// Backend object for the current generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionHandle>,
    /// Execution generation; bumped every time the build is (re-)initialized.
    #[serde(default)]
    pub generation: u64,
    /// When the current generation was launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<Timestamp>,
}

/// A container build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerBuild {
    /// Namespace and name; equal to the owning workflow's.
    pub key: ObjectKey,
    /// Unique id assigned at construction.
    pub uid: Uuid,
    /// Optimistic concurrency token, maintained by the store.
    #[serde(default)]
    pub resource_version: u64,
    /// Parent-link to the owning workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerReference>,
    /// Immutable build definition.
    pub spec: BuildSpec,
    /// Mutable state.
    #[serde(default)]
    pub status: BuildStatus,
}

impl ContainerBuild {
    /// Kind used in errors and owner references.
    pub const KIND: &'static str = "ContainerBuild";

    /// Creates a new build in phase `None`.
    #[must_use]
    pub fn new(key: ObjectKey, spec: BuildSpec) -> Self {
        Self {
            key,
            uid: Uuid::new_v4(),
            resource_version: 0,
            owner: None,
            spec,
            status: BuildStatus::default(),
        }
    }

    /// Creates the build for a workflow from the active platform's defaults,
    /// linked to the workflow as its owner.
    #[must_use]
    pub fn for_workflow(workflow: &WorkflowRef, platform: &Platform) -> Self {
        let image_name = format!("{}:latest", workflow.key.name);
        Self::new(workflow.key.clone(), BuildSpec::from_platform(platform, image_name))
            .with_owner(workflow.owner_reference())
    }

    /// Sets the owner reference.
    #[must_use]
    pub fn with_owner(mut self, owner: OwnerReference) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        self.status.phase
    }

    /// Returns the owner reference other objects created for this build carry.
    #[must_use]
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference::controller(Self::KIND, &self.key.name, self.uid)
    }
}

/// Serde adapter storing byte-content maps as base64 strings.
pub(crate) mod base64_map {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(k, v)| (k.as_str(), STANDARD.encode(v)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
