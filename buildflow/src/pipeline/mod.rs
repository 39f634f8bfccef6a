//! Action pipeline and recovery policy.
//!
//! This module provides:
//! - The ordered, first-match action pipeline
//! - Backoff and retry-budget policies for failed builds

mod backoff;
mod chain;

pub use backoff::{BackoffPolicy, RecoveryPolicy};
pub use chain::{ActionPipeline, TickOutcome};
