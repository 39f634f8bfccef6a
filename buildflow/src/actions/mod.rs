//! Pipeline actions.
//!
//! Each action owns one slice of the build lifecycle. The pipeline asks every
//! action in turn whether it can handle the record and hands the record to the
//! first one that can.

mod initialize;
mod monitor;
mod recovery;
mod schedule;

use crate::core::ContainerBuild;
use crate::errors::Result;
use async_trait::async_trait;
use std::fmt::Debug;

pub use initialize::InitializeAction;
pub use monitor::MonitorAction;
pub use recovery::{ErrorRecoveryAction, RecoveryState};
pub use schedule::ScheduleAction;

/// A unit of lifecycle work.
///
/// `handle` takes the record by value:
///
/// * `Ok(Some(build))` - the action changed the record
/// * `Ok(None)` - nothing to do yet; the record stays as it was
/// * `Err(_)` - the tick could not complete; the caller's copy is untouched
///
/// Re-invoking `handle` with an unchanged record must be safe.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Name used in logs and tick outcomes.
    fn name(&self) -> &str;

    /// Returns true if this action is responsible for the record's state.
    fn can_handle(&self, build: &ContainerBuild) -> bool;

    /// Advances the record.
    async fn handle(&self, build: ContainerBuild) -> Result<Option<ContainerBuild>>;
}
