//! Load-time measurement for a single request.

use std::time::{Duration, Instant};

use jiff::Timestamp;

/// Wall-clock and monotonic start of a request.
///
/// The wall-clock timestamp is reported as the request time; elapsed time is
/// measured on the monotonic clock so it can never be negative.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    started_at: Instant,
    received_at: Timestamp,
}

impl RequestTimer {
    /// Starts measuring now.
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
            received_at: Timestamp::now(),
        }
    }

    /// Returns when the timer was started.
    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    /// Returns the time elapsed since the timer was started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the elapsed time in fractional milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::start()
    }
}
