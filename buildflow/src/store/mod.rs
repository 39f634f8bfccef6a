//! Cluster-state collaborators: the build record store and the platform lookup.

pub mod memory;

use crate::core::{ContainerBuild, ObjectKey, Platform};
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;

pub use memory::{InMemoryBuildStore, InMemoryPlatformLookup};

/// Persistent storage for build records.
///
/// Implementations own `resource_version`: every successful write bumps it,
/// and writes carrying a stale version are rejected with `Conflict`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BuildStore: Send + Sync + Debug {
    /// Reads a record. Misses are reported as `NotFound`.
    async fn get(&self, key: &ObjectKey) -> Result<ContainerBuild>;

    /// Persists a new record. Fails with `AlreadyExists` if the identity is taken.
    async fn create(&self, build: ContainerBuild) -> Result<ContainerBuild>;

    /// Replaces the status of an existing record.
    async fn update_status(&self, build: &ContainerBuild) -> Result<ContainerBuild>;
}

/// Resolves the platform configuration active in a namespace.
#[async_trait]
pub trait PlatformLookup: Send + Sync + Debug {
    /// Returns the active platform, or `None` if the namespace has none.
    async fn active_platform(&self, namespace: &str) -> Result<Option<Platform>>;
}
