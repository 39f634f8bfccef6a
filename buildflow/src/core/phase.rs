//! Build phase and strategy selector enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The coarse-grained lifecycle state of a container build.
///
/// Phases only move forward, with one exception: the error-recovery action
/// may send a `Failed` build back to `Initialization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildPhase {
    /// Created but not yet scheduled.
    #[default]
    None,
    /// Scheduled; a new execution generation is about to be prepared.
    Initialization,
    /// Ready to launch on the execution backend.
    Scheduling,
    /// Launched, waiting for the backend to start it.
    Pending,
    /// The backend reports the build as running.
    Running,
    /// The image was built and published.
    Succeeded,
    /// The build failed; recovery may retry it.
    Failed,
    /// Retries were exhausted.
    Error,
}

impl BuildPhase {
    /// Returns true for absorbing phases no action may leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Error)
    }

    /// Returns true while the backend owns the build.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Position in the forward lifecycle, used to check monotonic progress.
    ///
    /// `Succeeded`, `Failed` and `Error` share the same rank: they are
    /// alternative outcomes rather than successive steps.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Initialization => 1,
            Self::Scheduling => 2,
            Self::Pending => 3,
            Self::Running => 4,
            Self::Succeeded | Self::Failed | Self::Error => 5,
        }
    }

    /// Returns true if an action may move a build from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if *self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Failed, Self::Initialization | Self::Error) => true,
            (Self::Failed, _) => false,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Initialization => write!(f, "Initialization"),
            Self::Scheduling => write!(f, "Scheduling"),
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Which execution backend performs the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStrategy {
    /// A workload running an image-builder executor.
    #[default]
    PodExecutor,
    /// The platform's own build-and-publish service.
    PlatformNative,
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PodExecutor => write!(f, "pod-executor"),
            Self::PlatformNative => write!(f, "platform-native"),
        }
    }
}

/// How the built image is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStrategy {
    /// Kaniko executor pushes to the registry.
    #[default]
    Kaniko,
    /// The platform build service publishes to its image stream.
    PlatformBuild,
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kaniko => write!(f, "kaniko"),
            Self::PlatformBuild => write!(f, "platform-build"),
        }
    }
}
