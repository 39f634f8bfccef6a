//! Core domain model types for buildflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Build phase and strategy selectors
//! - The container build record and its status
//! - Platform defaults and object identity
//! - Build events

pub(crate) mod build;
mod event;
mod object;
mod phase;
mod platform;

pub use build::{
    BuildFailure, BuildSpec, BuildStatus, ContainerBuild, ExecutionHandle, FailureRecovery,
};
pub use event::{BuildEvent, EventType};
pub use object::{ObjectKey, OwnerReference, WorkflowRef};
pub use phase::{BuildPhase, BuildStrategy, PublishStrategy};
pub use platform::{BuildTemplate, Platform, RegistrySpec, ResourceRequirements};
