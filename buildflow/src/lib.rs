//! # Buildflow
//!
//! A reconciliation engine that drives container image builds through a
//! phase lifecycle.
//!
//! Buildflow provides:
//!
//! - **Phase lifecycle**: `None → Initialization → Scheduling → Pending →
//!   Running → Succeeded`, with `Failed` retried under exponential backoff and
//!   frozen into `Error` once the retry budget is spent
//! - **First-match action pipeline**: an ordered list of actions, exactly one
//!   of which advances a record per tick
//! - **Pluggable execution strategies**: a pod executor running Kaniko, or the
//!   platform's native build service
//! - **Reconcile loop**: one tick per build identity, with requeue hints
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use buildflow::prelude::*;
//!
//! let manager = Arc::new(BuildManager::new(
//!     store,
//!     platforms,
//!     ExecutionStrategies::new(Arc::new(PodExecutorStrategy::new(executor, config.executor.clone()))),
//!     config.recovery.clone(),
//!     Arc::new(LoggingEventSink::default()),
//!     Arc::new(SystemClock),
//! ));
//! let reconciler = BuildReconciler::new(manager.clone(), config.requeue.clone());
//!
//! manager.get_or_create_build(&workflow).await?;
//! let result = reconciler.reconcile(&workflow.key).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod manager;
pub mod observability;
pub mod pipeline;
pub mod store;
pub mod strategy;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{
        Action, ErrorRecoveryAction, InitializeAction, MonitorAction, RecoveryState,
        ScheduleAction,
    };
    pub use crate::config::BuildflowConfig;
    pub use crate::core::{
        BuildEvent, BuildPhase, BuildSpec, BuildStatus, BuildStrategy, ContainerBuild,
        ObjectKey, Platform, PublishStrategy, WorkflowRef,
    };
    pub use crate::errors::{BuildflowError, Result};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::manager::{BuildManager, BuildReconciler, ReconcileResult, RequeueConfig};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{ActionPipeline, BackoffPolicy, RecoveryPolicy, TickOutcome};
    pub use crate::store::{BuildStore, PlatformLookup};
    pub use crate::strategy::{
        ExecutionStrategies, ExecutionStrategy, PlatformNativeStrategy, PodExecutorStrategy,
    };
    pub use crate::utils::{Clock, SystemClock, Timestamp};
    pub use std::sync::Arc;
}
