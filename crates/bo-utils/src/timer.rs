use std::time::{Duration, Instant};

/// Wall-clock measurement of a block of code.
///
/// Timers are independent of each other, so nesting one inside another's
/// block works as expected: the outer duration covers the inner one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    started: Instant,
    elapsed: Option<Duration>,
}

impl Timer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            elapsed: None,
        }
    }

    /// Runs `f` inside a fresh timer and returns its result with the stopped timer.
    pub fn scoped<R>(f: impl FnOnce() -> R) -> (R, Self) {
        let mut timer = Self::start();
        let result = f();
        timer.stop();
        (result, timer)
    }

    /// Freezes the measured duration. Later calls return the first value.
    pub fn stop(&mut self) -> Duration {
        if let Some(elapsed) = self.elapsed {
            return elapsed;
        }
        let elapsed = self.started.elapsed();
        tracing::trace!(stage = "timer", elapsed_us = elapsed.as_micros() as u64, "stopped");
        self.elapsed = Some(elapsed);
        elapsed
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.elapsed.is_none()
    }

    /// Time so far while running, the recorded duration once stopped.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.started.elapsed())
    }

    /// Recorded duration in seconds; `None` until stopped.
    #[must_use]
    pub fn time(&self) -> Option<f64> {
        self.elapsed.map(|elapsed| elapsed.as_secs_f64())
    }
}
