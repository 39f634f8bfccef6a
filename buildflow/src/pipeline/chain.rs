//! First-match action dispatch.

use super::RecoveryPolicy;
use crate::actions::{Action, ErrorRecoveryAction, InitializeAction, MonitorAction, ScheduleAction};
use crate::core::ContainerBuild;
use crate::errors::{BuildflowError, Result};
use crate::strategy::ExecutionStrategies;
use crate::utils::Clock;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Result of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// An action changed the record.
    Handled {
        /// The action that ran.
        action: String,
        /// The updated record.
        build: ContainerBuild,
    },
    /// An action matched but had nothing to do yet.
    Deferred {
        /// The action that ran.
        action: String,
    },
    /// No action matched the record.
    Idle,
}

impl TickOutcome {
    /// Returns the name of the action that ran, if any.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::Handled { action, .. } | Self::Deferred { action } => Some(action),
            Self::Idle => None,
        }
    }

    /// Consumes the outcome and returns the updated record, if any.
    #[must_use]
    pub fn into_build(self) -> Option<ContainerBuild> {
        match self {
            Self::Handled { build, .. } => Some(build),
            Self::Deferred { .. } | Self::Idle => None,
        }
    }
}

/// An ordered list of actions. The first action whose `can_handle` accepts
/// the record is the only one invoked.
#[derive(Debug, Clone)]
pub struct ActionPipeline {
    actions: Vec<Arc<dyn Action>>,
}

impl ActionPipeline {
    /// Creates a pipeline that evaluates `actions` in the given order.
    #[must_use]
    pub fn new(actions: Vec<Arc<dyn Action>>) -> Self {
        Self { actions }
    }

    /// Creates the standard build pipeline:
    /// initialize, schedule, monitor, error recovery.
    #[must_use]
    pub fn standard(
        strategies: ExecutionStrategies,
        policy: RecoveryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let actions: [Arc<dyn Action>; 4] = [
            Arc::new(InitializeAction::new()),
            Arc::new(ScheduleAction::new(strategies.clone(), clock.clone())),
            Arc::new(MonitorAction::new(strategies, clock.clone())),
            Arc::new(ErrorRecoveryAction::new(policy, clock)),
        ];
        Self::new(Vec::from(actions))
    }

    /// Returns the action names in evaluation order.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the pipeline has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs one pass over `build`.
    ///
    /// An update that breaks the phase order (anything backwards other than
    /// `Failed -> Initialization`, or leaving a terminal phase) is rejected
    /// with [`BuildflowError::Internal`] and never reaches the caller.
    pub async fn run(&self, build: &ContainerBuild) -> Result<TickOutcome> {
        for action in &self.actions {
            if !action.can_handle(build) {
                trace!(build = %build.key, action = action.name(), "Action skipped");
                continue;
            }

            debug!(build = %build.key, action = action.name(), phase = %build.phase(), "Action selected");
            let outcome = match action.handle(build.clone()).await? {
                Some(updated) if !build.phase().can_transition_to(updated.phase()) => {
                    error!(
                        build = %build.key,
                        action = action.name(),
                        from = %build.phase(),
                        to = %updated.phase(),
                        "Action produced an illegal phase transition"
                    );
                    return Err(BuildflowError::Internal(format!(
                        "action {} moved build {} from {} to {}",
                        action.name(),
                        build.key,
                        build.phase(),
                        updated.phase()
                    )));
                }
                Some(updated) => TickOutcome::Handled {
                    action: action.name().to_string(),
                    build: updated,
                },
                None => TickOutcome::Deferred {
                    action: action.name().to_string(),
                },
            };
            return Ok(outcome);
        }

        Ok(TickOutcome::Idle)
    }
}
