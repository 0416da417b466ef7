// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling — backoff scheduling and TTL
//! windows are both sensitive to wall-clock time, so every timing decision in
//! the orchestrator goes through this trait rather than calling
//! `SystemTime::now()` directly.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Formats a millisecond epoch timestamp as RFC 3339 for the few places the
/// HTTP surface needs a human-readable time rather than a raw `u64` (e.g.
/// the admin metrics snapshot's `generatedAt` field).
pub fn format_rfc3339(epoch_ms: u64) -> String {
    let secs = (epoch_ms / 1_000) as i64;
    let nanos = ((epoch_ms % 1_000) * 1_000_000) as u32;
    chrono::DateTime::from_timestamp(secs, nanos).unwrap_or_default().to_rfc3339()
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Fake clock for deterministic backoff/TTL tests.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(Instant::now())), epoch_ms: Arc::new(Mutex::new(1_700_000_000_000)) }
    }

    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}
