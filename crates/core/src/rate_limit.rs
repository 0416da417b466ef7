// SPDX-License-Identifier: MIT

//! Rate-limiter class vocabulary. The sliding-window implementation lives in
//! `ao-access`; the class enum is shared with the HTTP layer, which declares
//! a class per route.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimiterClass {
    FileOperation,
    Upload,
    AnalysisRun,
    Deletion,
    VersionOperation,
    Auth,
}

impl LimiterClass {
    /// `(windowMs, max)` defaults for this class.
    pub const fn defaults(self) -> (u64, u32) {
        match self {
            LimiterClass::FileOperation => (15 * 60_000, 50),
            LimiterClass::Upload => (15 * 60_000, 10),
            LimiterClass::AnalysisRun => (5 * 60_000, 30),
            LimiterClass::Deletion => (15 * 60_000, 20),
            LimiterClass::VersionOperation => (15 * 60_000, 100),
            LimiterClass::Auth => (15 * 60_000, 20),
        }
    }

    /// Environment variable name used to override this class's limit in test builds.
    pub const fn env_override_var(self) -> &'static str {
        match self {
            LimiterClass::FileOperation => "TEST_RATE_LIMIT_FILE_OPERATION",
            LimiterClass::Upload => "TEST_RATE_LIMIT_UPLOAD",
            LimiterClass::AnalysisRun => "TEST_RATE_LIMIT_ANALYSIS_RUN",
            LimiterClass::Deletion => "TEST_RATE_LIMIT_DELETION",
            LimiterClass::VersionOperation => "TEST_RATE_LIMIT_VERSION_OPERATION",
            LimiterClass::Auth => "TEST_RATE_LIMIT_AUTH",
        }
    }
}
