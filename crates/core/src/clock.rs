// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.
//!
//! Every duration computation in the fleet supervisor (session expiry,
//! schedule due-ness, job duration) goes through this trait so tests can
//! advance time deterministically instead of sleeping.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of both wall-clock (`DateTime<Utc>`) and monotonic (`Instant`) time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, used for measuring elapsed durations.
    fn monotonic(&self) -> Instant;
    /// Current wall-clock time in UTC, used for persisted timestamps.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    monotonic: Arc<Mutex<Instant>>,
    wall: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            monotonic: Arc::new(Mutex::new(Instant::now())),
            wall: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Advance both the monotonic and wall clocks by the same duration.
    pub fn advance(&self, duration: Duration) {
        *self.monotonic.lock() += duration;
        if let Ok(d) = chrono::Duration::from_std(duration) {
            *self.wall.lock() += d;
        }
    }

    /// Pin the wall clock to a specific instant.
    pub fn set_now(&self, at: DateTime<Utc>) {
        *self.wall.lock() = at;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn monotonic(&self) -> Instant {
        *self.monotonic.lock()
    }

    fn now(&self) -> DateTime<Utc> {
        *self.wall.lock()
    }
}
