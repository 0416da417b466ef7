// SPDX-License-Identifier: MIT

//! Log entries emitted by a running analysis and the bounded in-memory
//! ring that buffers the most recent ones.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of output from a child process, or a synthetic system entry
/// (e.g. "logs cleared due to size").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Strictly increasing within an analysis; the fan-out's dedup key.
    pub sequence: u64,
    pub timestamp: u64,
    pub level: LogLevel,
    pub message: String,
}

pub const DEFAULT_MAX_MEMORY_LOGS: usize = 100;

/// FIFO of at most `max` most-recent entries; evicts the oldest on overflow.
pub struct LogBuffer {
    max: usize,
    entries: VecDeque<LogEntry>,
    total_log_count: u64,
}

impl LogBuffer {
    pub fn new(max: usize) -> Self {
        Self { max: max.max(1), entries: VecDeque::with_capacity(max.max(1)), total_log_count: 0 }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.max {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_log_count += 1;
    }

    pub fn total_log_count(&self) -> u64 {
        self.total_log_count
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_log_count = 0;
    }

    /// Clear and seed with a single synthetic entry (used by size-cap
    /// truncation and explicit `clearLogs`).
    pub fn reset_with(&mut self, entry: LogEntry) {
        self.clear();
        self.entries.push_back(entry);
        self.total_log_count = 1;
    }

    /// Paged view over newest-first ordering.
    pub fn page(&self, page: usize, limit: usize) -> (Vec<LogEntry>, bool, usize) {
        let total = self.entries.len();
        if limit == 0 {
            return (Vec::new(), false, total);
        }
        let newest_first: Vec<&LogEntry> = self.entries.iter().rev().collect();
        let start = page.saturating_sub(1).saturating_mul(limit);
        if start >= total {
            return (Vec::new(), false, total);
        }
        let end = (start + limit).min(total);
        let logs = newest_first[start..end].iter().map(|e| (*e).clone()).collect();
        let has_more = end < total;
        (logs, has_more, total)
    }
}
