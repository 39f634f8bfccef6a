//! In-memory store and platform lookup, for simulation and tests.

use super::{BuildStore, PlatformLookup};
use crate::core::{ContainerBuild, ObjectKey, Platform};
use crate::errors::{BuildflowError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Build records kept in a concurrent map with optimistic concurrency.
#[derive(Debug, Default)]
pub struct InMemoryBuildStore {
    builds: DashMap<ObjectKey, ContainerBuild>,
}

impl InMemoryBuildStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records, ordered by identity.
    #[must_use]
    pub fn list(&self) -> Vec<ContainerBuild> {
        let mut builds: Vec<_> = self.builds.iter().map(|e| e.value().clone()).collect();
        builds.sort_by(|a, b| a.key.cmp(&b.key));
        builds
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// Deletes a record. Returns true if it existed.
    pub fn delete(&self, key: &ObjectKey) -> bool {
        self.builds.remove(key).is_some()
    }

    /// Deletes every record whose owner reference points at `owner_uid`.
    /// Returns the number of records removed.
    pub fn delete_owned_by(&self, owner_uid: Uuid) -> usize {
        let before = self.builds.len();
        self.builds
            .retain(|_, build| build.owner.as_ref().map_or(true, |o| o.uid != owner_uid));
        let removed = before.saturating_sub(self.builds.len());
        if removed > 0 {
            debug!(%owner_uid, removed, "Deleted builds with their owner");
        }
        removed
    }
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn get(&self, key: &ObjectKey) -> Result<ContainerBuild> {
        self.builds
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| BuildflowError::not_found(ContainerBuild::KIND, key.clone()))
    }

    async fn create(&self, mut build: ContainerBuild) -> Result<ContainerBuild> {
        match self.builds.entry(build.key.clone()) {
            Entry::Occupied(_) => Err(BuildflowError::already_exists(
                ContainerBuild::KIND,
                build.key,
            )),
            Entry::Vacant(slot) => {
                build.resource_version = 1;
                slot.insert(build.clone());
                Ok(build)
            }
        }
    }

    async fn update_status(&self, build: &ContainerBuild) -> Result<ContainerBuild> {
        let mut stored = self
            .builds
            .get_mut(&build.key)
            .ok_or_else(|| BuildflowError::not_found(ContainerBuild::KIND, build.key.clone()))?;

        if stored.resource_version != build.resource_version {
            return Err(BuildflowError::Conflict {
                key: build.key.clone(),
                expected: build.resource_version,
                actual: stored.resource_version,
            });
        }

        stored.status = build.status.clone();
        stored.resource_version += 1;
        Ok(stored.clone())
    }
}

/// Active platforms keyed by namespace.
#[derive(Debug, Default)]
pub struct InMemoryPlatformLookup {
    platforms: DashMap<String, Platform>,
}

impl InMemoryPlatformLookup {
    /// Creates a lookup with no platforms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a platform for `namespace`.
    #[must_use]
    pub fn with_platform(self, namespace: impl Into<String>, platform: Platform) -> Self {
        self.insert(namespace, platform);
        self
    }

    /// Sets the active platform of `namespace`.
    pub fn insert(&self, namespace: impl Into<String>, platform: Platform) {
        self.platforms.insert(namespace.into(), platform);
    }

    /// Removes the active platform of `namespace`.
    pub fn remove(&self, namespace: &str) -> Option<Platform> {
        self.platforms.remove(namespace).map(|(_, p)| p)
    }
}

#[async_trait]
impl PlatformLookup for InMemoryPlatformLookup {
    async fn active_platform(&self, namespace: &str) -> Result<Option<Platform>> {
        Ok(self.platforms.get(namespace).map(|e| e.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BuildPhase, WorkflowRef};
    use crate::testing::{sample_build, sample_platform};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryBuildStore::new();
        let created = store.create(sample_build("greetings")).await.unwrap();
        assert_eq!(created.resource_version, 1);

        let fetched = store.get(&created.key).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryBuildStore::new();
        let err = store.get(&ObjectKey::new("default", "nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let store = InMemoryBuildStore::new();
        store.create(sample_build("greetings")).await.unwrap();
        let err = store.create(sample_build("greetings")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryBuildStore::new();
        let created = store.create(sample_build("greetings")).await.unwrap();

        let mut first = created.clone();
        first.status.phase = BuildPhase::Initialization;
        let updated = store.update_status(&first).await.unwrap();
        assert_eq!(updated.resource_version, 2);

        let mut stale = created;
        stale.status.phase = BuildPhase::Error;
        let err = store.update_status(&stale).await.unwrap_err();
        assert!(matches!(
            err,
            BuildflowError::Conflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(
            store.get(&updated.key).await.unwrap().phase(),
            BuildPhase::Initialization
        );
    }

    #[tokio::test]
    async fn test_update_keeps_spec() {
        let store = InMemoryBuildStore::new();
        let created = store.create(sample_build("greetings")).await.unwrap();

        let mut changed = created.clone();
        changed.spec.image_name = "other:latest".into();
        changed.status.phase = BuildPhase::Initialization;
        let updated = store.update_status(&changed).await.unwrap();
        assert_eq!(updated.spec, created.spec);
    }

    #[tokio::test]
    async fn test_delete_owned_by_cascades() {
        let store = InMemoryBuildStore::new();
        let platform = sample_platform();
        let owner = WorkflowRef::new("default", "greetings", Uuid::new_v4());
        store
            .create(ContainerBuild::for_workflow(&owner, &platform))
            .await
            .unwrap();
        store.create(sample_build("unowned")).await.unwrap();

        assert_eq!(store.delete_owned_by(owner.uid), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&owner.key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_platform_lookup() {
        let lookup = InMemoryPlatformLookup::new().with_platform("default", sample_platform());
        assert!(lookup.active_platform("default").await.unwrap().is_some());
        assert!(lookup.active_platform("other").await.unwrap().is_none());

        lookup.remove("default");
        assert!(lookup.active_platform("default").await.unwrap().is_none());
    }
}
