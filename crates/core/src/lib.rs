// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-core: shared domain types for the analysis orchestrator — ids, clock,
//! the analysis/team/permission/folder data model, log entries, the DNS
//! cache value types, the rate-limiter class vocabulary, the cross-cutting
//! error taxonomy, and the live-event wire vocabulary.

pub mod analysis;
pub mod clock;
pub mod dns;
pub mod error;
pub mod event;
pub mod folder;
pub mod id;
pub mod log_entry;
pub mod rate_limit;
pub mod team;

pub use analysis::{Analysis, AnalysisId, AnalysisStatus, AnalysisVersion, IntendedState, UNCATEGORIZED_TEAM};
pub use clock::{format_rfc3339, Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use dns::{AddressFamily, DnsCacheEntrySnapshot, DnsCacheValue, DnsConfig, DnsStats};
pub use error::{ErrorKind, FieldError, HasErrorKind};
pub use event::LiveEvent;
pub use folder::{Folder, FolderId, TreeItem};
pub use id::IdBuf;
pub use log_entry::{LogBuffer, LogEntry, LogLevel, DEFAULT_MAX_MEMORY_LOGS};
pub use rate_limit::LimiterClass;
pub use team::{Membership, Permission, Team, TeamId, User, UserId};
