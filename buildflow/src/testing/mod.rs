//! Testing utilities for the build engine.
//!
//! This module provides:
//! - In-memory fakes for the execution backends
//! - A recording action for pipeline tests
//! - Sample records and a fully wired test harness
//! - Assertions on phases and events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_attempt, assert_phase, assert_phase_events};
pub use fixtures::{
    sample_build, sample_platform, sample_workflow, TestHarness, TEST_NAMESPACE,
};
pub use mocks::{FakePlatformBuildService, FakeWorkloadExecutor, RecordingAction};
