//! Timestamp helpers.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Returns the time elapsed from `since` to `now`, clamped at zero when the
/// clock moved backwards.
#[must_use]
pub fn elapsed_between(since: Timestamp, now: Timestamp) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_elapsed_between() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::seconds(6);
        assert_eq!(elapsed_between(t0, t1), Duration::from_secs(6));
        assert_eq!(elapsed_between(t1, t0), Duration::ZERO);
    }
}
