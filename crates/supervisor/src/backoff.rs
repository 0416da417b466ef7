// SPDX-License-Identifier: MIT

//! Pure exit-classification and backoff-delay logic. Kept free of any
//! process/timer machinery so the exit-classification scenarios can be
//! asserted against plain function calls.

use std::time::Duration;

pub const DEFAULT_INITIAL_RESTART_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MAX_RESTART_DELAY_MS: u64 = 60_000;
pub const DEFAULT_FORCE_KILL_TIMEOUT_MS: u64 = 5_000;
/// A clean exit at or below this lifetime is treated as a failed listener,
/// not a graceful shutdown.
pub const SHORT_LIVED_THRESHOLD_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { initial_delay_ms: DEFAULT_INITIAL_RESTART_DELAY_MS, max_delay_ms: DEFAULT_MAX_RESTART_DELAY_MS }
    }
}

impl BackoffPolicy {
    /// `delay = min(initial * 2^(attempt-1), max)`, `attempt` starting at 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let scaled = self.initial_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(scaled.min(self.max_delay_ms))
    }
}

/// Why the exited child should (or shouldn't) be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// `intendedState == stopped`: this was a manual stop, never restart.
    ManualStop,
    /// The SDK connection-error heuristic fired before exit.
    ConnectionErrorLoop,
    /// Non-zero exit code.
    Crash,
    /// Zero exit but the process lived `<= SHORT_LIVED_THRESHOLD_MS` — a
    /// listener that should have stayed up; restart immediately.
    ShortLivedCleanExit,
    /// Zero exit after running longer than the threshold; restart on the
    /// normal initial delay (restart scheduled either way, only the delay
    /// differs).
    LongRunningCleanExit,
}

/// Classifies one child exit by intent, connection-error heuristic, exit
/// code, and lifetime, in that priority order.
pub fn classify_exit(exit_code: i32, intended_stopped: bool, connection_error_detected: bool, ran_for: Duration) -> ExitDisposition {
    if intended_stopped {
        return ExitDisposition::ManualStop;
    }
    if connection_error_detected {
        return ExitDisposition::ConnectionErrorLoop;
    }
    if exit_code != 0 {
        return ExitDisposition::Crash;
    }
    if ran_for <= Duration::from_millis(SHORT_LIVED_THRESHOLD_MS) {
        ExitDisposition::ShortLivedCleanExit
    } else {
        ExitDisposition::LongRunningCleanExit
    }
}

impl ExitDisposition {
    /// Whether a restart should be scheduled at all.
    pub fn should_restart(self) -> bool {
        !matches!(self, ExitDisposition::ManualStop)
    }

    /// The delay to schedule the restart after, given the 1-indexed restart
    /// attempt counter (already incremented for this exit) and the
    /// configured backoff policy. `ShortLivedCleanExit` restarts immediately
    /// regardless of attempt count.
    pub fn restart_delay(self, policy: BackoffPolicy, restart_attempts: u32) -> Option<Duration> {
        match self {
            ExitDisposition::ManualStop => None,
            ExitDisposition::ShortLivedCleanExit => Some(Duration::ZERO),
            ExitDisposition::ConnectionErrorLoop | ExitDisposition::Crash => Some(policy.delay_for_attempt(restart_attempts)),
            ExitDisposition::LongRunningCleanExit => Some(Duration::from_millis(policy.initial_delay_ms)),
        }
    }
}
