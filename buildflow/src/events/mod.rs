//! Event sink system for observability.
//!
//! Every persisted phase change of a build is reported to an [`EventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
