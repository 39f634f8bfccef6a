//! Test assertions for build records and events.

use crate::core::{BuildPhase, ContainerBuild};
use crate::events::CollectingEventSink;

/// Asserts that the build is in the expected phase.
pub fn assert_phase(build: &ContainerBuild, expected: BuildPhase) {
    assert_eq!(
        build.phase(),
        expected,
        "Expected build {} in phase {}, got {} (error: {:?})",
        build.key,
        expected,
        build.phase(),
        build.status.error
    );
}

/// Asserts that exactly these phase changes were emitted, in order.
pub fn assert_phase_events(events: &CollectingEventSink, expected: &[BuildPhase]) {
    let expected: Vec<String> = expected
        .iter()
        .map(|phase| format!("Updated buildphase to {phase}"))
        .collect();
    assert_eq!(events.messages(), expected, "Unexpected phase event sequence");
}

/// Asserts that the build's retry counter has the expected value.
pub fn assert_attempt(build: &ContainerBuild, expected: u32) {
    let attempt = build.status.failure.as_ref().map(|f| f.recovery.attempt);
    assert_eq!(
        attempt,
        Some(expected),
        "Expected recovery attempt {expected} on {}, got {attempt:?}",
        build.key
    );
}
