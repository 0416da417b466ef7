// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-fanout: the live-event SSE fan-out — per-session
//! subscription sets, per-user/per-team/admin addressing, and the
//! sequence-based deduplication contract the Supervisor relies on (clients
//! dedupe `log` events by `sequence`, not this crate).

pub mod hub;
pub mod session;

pub use hub::FanoutHub;
pub use session::{SessionId, SseSession, OUTGOING_QUEUE_CAPACITY};
