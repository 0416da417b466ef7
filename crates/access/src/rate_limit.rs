// SPDX-License-Identifier: MIT

//! Per-`(limiterClass, key)` fixed-window rate limiter. `key` is
//! the authenticated user id when known, else the caller's IP; each class
//! carries its own `(windowMs, max)` pair, overridable in test builds via
//! `TEST_RATE_LIMIT_*` environment variables.

use ao_core::{Clock, LimiterClass};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Caller should retry after roughly this many milliseconds.
    Limited { retry_after_ms: u64 },
}

struct Bucket {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter<C: Clock> {
    clock: C,
    buckets: Mutex<HashMap<(LimiterClass, String), Bucket>>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, buckets: Mutex::new(HashMap::new()) }
    }

    /// `(windowMs, max)` for `class`, honoring a `TEST_RATE_LIMIT_*`
    /// environment override when present and parseable as `max/windowMs`.
    fn limits(class: LimiterClass) -> (u64, u32) {
        if let Ok(raw) = std::env::var(class.env_override_var()) {
            if let Some((max_s, window_s)) = raw.split_once('/') {
                if let (Ok(max), Ok(window_ms)) = (max_s.trim().parse(), window_s.trim().parse()) {
                    return (window_ms, max);
                }
            }
        }
        class.defaults()
    }

    /// `auth` class exempts session-probe reads.
    pub fn is_exempt(class: LimiterClass, method: &str, path: &str) -> bool {
        class == LimiterClass::Auth && method.eq_ignore_ascii_case("GET") && path == "/api/auth/get-session"
    }

    /// Records one attempt for `(class, key)` and returns whether it's
    /// allowed under the class's fixed window.
    pub fn check(&self, class: LimiterClass, key: &str) -> RateLimitDecision {
        let (window_ms, max) = Self::limits(class);
        let window = Duration::from_millis(window_ms);
        let now = self.clock.now();

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry((class, key.to_string())).or_insert_with(|| Bucket { count: 0, window_start: now });

        if now.duration_since(bucket.window_start) >= window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= max {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after_ms = window.saturating_sub(elapsed).as_millis() as u64;
            return RateLimitDecision::Limited { retry_after_ms };
        }

        bucket.count += 1;
        RateLimitDecision::Allowed
    }
}
