//! Fake collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::actions::Action;
use crate::core::{BuildPhase, ContainerBuild, ObjectKey};
use crate::errors::{BuildflowError, Result};
use crate::strategy::{
    BuildConfigSpec, ImageStreamSpec, PlatformBuildPhase, PlatformBuildService,
    PlatformBuildStatus, WorkloadExecutor, WorkloadPhase, WorkloadSpec, WorkloadStatus,
};

/// A workload executor that keeps workloads in memory.
///
/// New workloads start `Pending`; tests move them along with [`set_phase`].
///
/// [`set_phase`]: FakeWorkloadExecutor::set_phase
#[derive(Debug, Default)]
pub struct FakeWorkloadExecutor {
    workloads: Mutex<BTreeMap<String, WorkloadStatus>>,
    created: Mutex<Vec<WorkloadSpec>>,
    failures: Mutex<VecDeque<String>>,
}

impl FakeWorkloadExecutor {
    /// Creates an executor with no workloads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every workload created so far, in creation order.
    #[must_use]
    pub fn created(&self) -> Vec<WorkloadSpec> {
        self.created.lock().clone()
    }

    /// Sets the state of workload `name`.
    pub fn set_phase(&self, name: &str, phase: WorkloadPhase, message: Option<&str>) {
        self.workloads.lock().insert(
            name.to_string(),
            WorkloadStatus {
                phase,
                message: message.map(str::to_string),
            },
        );
    }

    /// Removes workload `name`, as if someone deleted it.
    pub fn remove(&self, name: &str) {
        self.workloads.lock().remove(name);
    }

    /// Makes the next call fail with a transient backend error.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    fn take_failure(&self) -> Result<()> {
        match self.failures.lock().pop_front() {
            Some(message) => Err(BuildflowError::Backend(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WorkloadExecutor for FakeWorkloadExecutor {
    async fn create_workload(&self, spec: WorkloadSpec) -> Result<()> {
        self.take_failure()?;
        let mut workloads = self.workloads.lock();
        if workloads.contains_key(&spec.key.name) {
            return Err(BuildflowError::already_exists("Workload", spec.key));
        }
        workloads.insert(
            spec.key.name.clone(),
            WorkloadStatus {
                phase: WorkloadPhase::Pending,
                message: None,
            },
        );
        self.created.lock().push(spec);
        Ok(())
    }

    async fn get_workload(&self, key: &ObjectKey) -> Result<Option<WorkloadStatus>> {
        self.take_failure()?;
        Ok(self.workloads.lock().get(&key.name).cloned())
    }
}

/// A platform build service that keeps its objects in memory.
#[derive(Debug, Default)]
pub struct FakePlatformBuildService {
    image_streams: Mutex<BTreeSet<ObjectKey>>,
    configs: Mutex<BTreeMap<ObjectKey, BuildConfigSpec>>,
    builds: Mutex<BTreeMap<String, PlatformBuildStatus>>,
    started: Mutex<Vec<String>>,
}

impl FakePlatformBuildService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registered image streams.
    #[must_use]
    pub fn image_streams(&self) -> Vec<ObjectKey> {
        self.image_streams.lock().iter().cloned().collect()
    }

    /// Returns the registered build config for `key`.
    #[must_use]
    pub fn build_config(&self, key: &ObjectKey) -> Option<BuildConfigSpec> {
        self.configs.lock().get(key).cloned()
    }

    /// Returns the names of every build started so far.
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Sets the state of build `name`.
    pub fn set_phase(&self, name: &str, phase: PlatformBuildPhase, message: Option<&str>) {
        self.builds.lock().insert(
            name.to_string(),
            PlatformBuildStatus {
                phase,
                message: message.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl PlatformBuildService for FakePlatformBuildService {
    async fn ensure_image_stream(&self, spec: ImageStreamSpec) -> Result<()> {
        self.image_streams.lock().insert(spec.key);
        Ok(())
    }

    async fn ensure_build_config(&self, spec: BuildConfigSpec) -> Result<()> {
        self.configs.lock().insert(spec.key.clone(), spec);
        Ok(())
    }

    async fn instantiate_build(&self, config: &ObjectKey, build_name: &str) -> Result<()> {
        if !self.configs.lock().contains_key(config) {
            return Err(BuildflowError::not_found("BuildConfig", config.clone()));
        }
        let mut builds = self.builds.lock();
        if builds.contains_key(build_name) {
            return Err(BuildflowError::already_exists(
                "Build",
                ObjectKey::new(&config.namespace, build_name),
            ));
        }
        builds.insert(
            build_name.to_string(),
            PlatformBuildStatus {
                phase: PlatformBuildPhase::New,
                message: None,
            },
        );
        self.started.lock().push(build_name.to_string());
        Ok(())
    }

    async fn get_build(&self, key: &ObjectKey) -> Result<Option<PlatformBuildStatus>> {
        Ok(self.builds.lock().get(&key.name).cloned())
    }
}

#[derive(Debug, Clone, Copy)]
enum RecordingMode {
    Touch,
    MoveTo(BuildPhase),
    Defer,
    Fail,
}

/// An action that records the builds it was handed.
#[derive(Debug)]
pub struct RecordingAction {
    name: String,
    phases: Vec<BuildPhase>,
    mode: RecordingMode,
    calls: Mutex<Vec<ObjectKey>>,
}

impl RecordingAction {
    fn with_mode(name: &str, phases: &[BuildPhase], mode: RecordingMode) -> Self {
        Self {
            name: name.to_string(),
            phases: phases.to_vec(),
            mode,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates an action that handles `phases` and returns the record unchanged.
    #[must_use]
    pub fn new(name: &str, phases: &[BuildPhase]) -> Self {
        Self::with_mode(name, phases, RecordingMode::Touch)
    }

    /// Creates an action that handles `phases` by moving the record to `target`.
    #[must_use]
    pub fn moving_to(name: &str, phases: &[BuildPhase], target: BuildPhase) -> Self {
        Self::with_mode(name, phases, RecordingMode::MoveTo(target))
    }

    /// Creates an action that handles `phases` and always defers.
    #[must_use]
    pub fn deferring(name: &str, phases: &[BuildPhase]) -> Self {
        Self::with_mode(name, phases, RecordingMode::Defer)
    }

    /// Creates an action that handles `phases` and always fails.
    #[must_use]
    pub fn failing(name: &str, phases: &[BuildPhase]) -> Self {
        Self::with_mode(name, phases, RecordingMode::Fail)
    }

    /// Returns the number of times `handle` ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the identities `handle` was called with.
    #[must_use]
    pub fn recorded(&self) -> Vec<ObjectKey> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, build: &ContainerBuild) -> bool {
        self.phases.contains(&build.phase())
    }

    async fn handle(&self, mut build: ContainerBuild) -> Result<Option<ContainerBuild>> {
        self.calls.lock().push(build.key.clone());
        match self.mode {
            RecordingMode::Touch => Ok(Some(build)),
            RecordingMode::MoveTo(phase) => {
                build.status.phase = phase;
                Ok(Some(build))
            }
            RecordingMode::Defer => Ok(None),
            RecordingMode::Fail => Err(BuildflowError::Internal(format!(
                "{} failed on purpose",
                self.name
            ))),
        }
    }
}
