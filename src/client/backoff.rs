//! Retry backoff for a single client
//!
//! Tracks two things: the delay before the next attempt (1 ms seed, doubling
//! up to a 100 ms ceiling) and the wall-clock duration of the current error
//! streak. The streak duration is what decides when a transient failure gets
//! promoted to a fatal one.

use std::time::Duration;
use tokio::time::Instant;

const INITIAL_DELAY: Duration = Duration::from_millis(1);
const MAX_DELAY: Duration = Duration::from_millis(100);

/// Error-streak clock and retry delay for one client.
///
/// Uses `tokio::time::Instant`, so tests under a paused runtime drive the
/// streak deterministically.
#[derive(Debug)]
pub(crate) struct Backoff {
    delay: Duration,
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            accumulated: Duration::ZERO,
            running_since: None,
        }
    }

    /// Begin or resume the error-streak clock. Idempotent while running.
    pub(crate) fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Duration of the current error streak. Freezes the clock; `start`
    /// resumes accumulation.
    pub(crate) fn elapsed(&mut self) -> Duration {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
        self.accumulated
    }

    /// Record a failed attempt: keep the streak clock running and take the
    /// delay one step up the doubling ladder.
    pub(crate) fn note_error(&mut self) {
        self.start();
        self.delay = if self.delay.is_zero() {
            INITIAL_DELAY
        } else {
            (self.delay * 2).min(MAX_DELAY)
        };
    }

    /// A successful response ends the streak: zero the clock and the delay,
    /// so the next scheduled request fires immediately.
    pub(crate) fn reset(&mut self) {
        self.delay = Duration::ZERO;
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    /// Delay to apply before the next attempt.
    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }
}
