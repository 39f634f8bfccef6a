//! Build event type recorded for operational visibility.

use super::{BuildPhase, ObjectKey};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a build event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Routine lifecycle information.
    Normal,
    /// Something an operator may want to look at.
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// An event attached to a build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Severity.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Short machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// The build the event is about.
    pub involved_object: ObjectKey,
    /// When the event was created.
    pub timestamp: Timestamp,
}

impl BuildEvent {
    /// Reason used for persisted phase changes.
    pub const REASON_UPDATED: &'static str = "Updated";

    /// Creates a new event.
    #[must_use]
    pub fn new(
        event_type: EventType,
        involved_object: ObjectKey,
        reason: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            event_type,
            reason: reason.into(),
            message: message.into(),
            involved_object,
            timestamp,
        }
    }

    /// Creates the event emitted for every persisted phase change.
    #[must_use]
    pub fn phase_updated(key: ObjectKey, phase: BuildPhase, timestamp: Timestamp) -> Self {
        Self::new(
            EventType::Normal,
            key,
            Self::REASON_UPDATED,
            format!("Updated buildphase to {phase}"),
            timestamp,
        )
    }
}
