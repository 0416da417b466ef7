// SPDX-License-Identifier: MIT

//! Value types for the shared DNS resolver's cache and statistics. The
//! cache and IPC server implementations live in `ao-dns`; these types are
//! shared with the HTTP admin surface, which is why they live in core.

use serde::{Deserialize, Serialize};

/// Address family requested by a `DNS_LOOKUP_REQUEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    V4,
    V6,
    /// No family preference; resolver picks.
    Unspecified,
}

/// The cached payload for one DNS cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DnsCacheValue {
    Lookup { address: String, family: AddressFamily },
    Resolve4 { addresses: Vec<String> },
    Resolve6 { addresses: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsCacheEntrySnapshot {
    pub key: String,
    pub value: DnsCacheValue,
    pub age_ms: u64,
    pub remaining_ttl_ms: i64,
    pub expired: bool,
    pub source: &'static str,
}

/// Accumulated within the current TTL window; reset every `ttl` milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DnsStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub evictions: u64,
}

impl DnsStats {
    /// Hit rate as a percentage with two decimal places; `0.0` if no requests.
    pub fn hit_rate_percent(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.hits as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_entries: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self { enabled: true, ttl_ms: 60_000, max_entries: 1000 }
    }
}
