//! Error types for the buildflow engine.
//!
//! Declared build failures are not errors: they live in the record's status
//! (`BuildPhase::Failed` plus a message) and are handled by the recovery
//! action. Everything in this module describes a tick or call that could not
//! complete.

use crate::core::{BuildPhase, ObjectKey};
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, BuildflowError>;

/// The main error type for buildflow operations.
#[derive(Debug, Error)]
pub enum BuildflowError {
    /// The requested object does not exist in the store or backend.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind of object that was looked up.
        kind: String,
        /// Identity that was looked up.
        key: ObjectKey,
    },

    /// An object with the same identity already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Kind of object that was created.
        kind: String,
        /// Identity of the existing object.
        key: ObjectKey,
    },

    /// The record was modified since it was read.
    #[error("Conflict updating {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        /// Identity of the record.
        key: ObjectKey,
        /// Resource version the caller held.
        expected: u64,
        /// Resource version currently stored.
        actual: u64,
    },

    /// No active platform is configured for the namespace.
    #[error("No active platform found in namespace '{namespace}'")]
    PlatformNotFound {
        /// The namespace that was searched.
        namespace: String,
    },

    /// An operation was invoked on a record in the wrong phase.
    #[error("Build {key} is in phase {actual}, expected {expected}")]
    InvalidPhase {
        /// Identity of the record.
        key: ObjectKey,
        /// Phase the operation requires.
        expected: String,
        /// Phase the record was in.
        actual: BuildPhase,
    },

    /// The build or platform configuration cannot be executed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A name or value failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The cluster-state store could not be reached or failed.
    #[error("Store error: {0}")]
    Store(String),

    /// An execution backend could not be reached or failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildflowError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key,
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            key,
        }
    }

    /// Returns true for lookup misses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for create collisions.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if retrying the same call on a later tick may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Backend(_) | Self::Conflict { .. } | Self::Io(_)
        )
    }
}

impl From<serde_json::Error> for BuildflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = BuildflowError::not_found("ContainerBuild", ObjectKey::new("ns", "greetings"));
        assert_eq!(err.to_string(), "ContainerBuild ns/greetings not found");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(BuildflowError::Store("connection refused".into()).is_transient());
        assert!(BuildflowError::Backend("timeout".into()).is_transient());
        assert!(BuildflowError::Conflict {
            key: ObjectKey::new("ns", "b"),
            expected: 1,
            actual: 2,
        }
        .is_transient());
        assert!(!BuildflowError::PlatformNotFound {
            namespace: "ns".into()
        }
        .is_transient());
        assert!(!BuildflowError::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_invalid_phase_display() {
        let err = BuildflowError::InvalidPhase {
            key: ObjectKey::new("ns", "b"),
            expected: "None".into(),
            actual: BuildPhase::Running,
        };
        assert_eq!(err.to_string(), "Build ns/b is in phase Running, expected None");
    }

    #[test]
    fn test_from_serde_error() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: BuildflowError = parse.unwrap_err().into();
        assert!(matches!(err, BuildflowError::Serialization(_)));
    }
}
