// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-dns: the shared, parent-resident DNS resolver — cache with
//! TTL/FIFO eviction, SSRF hostname/address filtering, the IPC wire protocol
//! every child worker speaks instead of its own OS resolver, and the
//! control-surface persistence for `dns-cache-config.json`.

pub mod cache;
pub mod config;
pub mod protocol;
pub mod server;
pub mod service;
pub mod ssrf;

pub use cache::DnsCache;
pub use protocol::{DnsRequest, DnsResponse, CHILD_REQUEST_TIMEOUT_MS};
pub use service::DnsService;
pub use ssrf::SsrfPolicy;
