//! Utility functions for timestamps, time sources and name validation.

mod clock;
pub mod timestamps;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timestamps::{elapsed_between, Timestamp};
pub use validation::{validate_build_name, validate_label_name, validate_resource_name};
