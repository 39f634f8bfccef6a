use std::time::Instant;

/// Measures how long a reconcile tick takes.
#[derive(Debug)]
pub struct TickTimer {
    start: Instant,
    name: String,
}

impl TickTimer {
    /// Starts a timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the timer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and returns the elapsed milliseconds.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_timer() {
        let timer = TickTimer::start("default/greetings");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(timer.name(), "default/greetings");
        assert!(timer.finish() >= 5.0);
    }
}
