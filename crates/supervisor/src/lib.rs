// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-supervisor: the Analysis Supervisor — per-analysis child
//! process lifecycle, output handling, exit classification, and
//! exponential-backoff restart scheduling.

pub mod backoff;
pub mod error;
pub mod launcher;
pub mod output;
mod runtime;

pub use backoff::{BackoffPolicy, ExitDisposition};
pub use error::SupervisorError;
pub use launcher::{ChildLauncher, DefaultLauncher, ShellLauncher, SpawnContext};
pub use runtime::AnalysisSupervisor;

#[cfg(test)]
mod runtime_tests;
