// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-access: the permission resolver and the per-operation-class
//! sliding-window rate limiter. Both are read by the HTTP glue
//! before it dispatches into the Supervisor or DNS control surface.

pub mod permission;
pub mod rate_limit;

pub use permission::PermissionResolver;
pub use rate_limit::{RateLimitDecision, RateLimiter};
