// SPDX-License-Identifier: MIT

//! Persistence for `<config>/dns-cache-config.json` and the
//! environment-variable overrides recognized at startup
//! (`DNS_CACHE_ENABLED`, `DNS_CACHE_TTL`, `DNS_CACHE_MAX_ENTRIES`).

use ao_core::DnsConfig;
use ao_storage::config_store::{read_json, write_json_atomic, ConfigStoreError};
use std::path::Path;

/// Loads `dns-cache-config.json` if present, falling back to defaults
/// overridden by environment variables, matching the precedence the
/// teacher's config layer uses elsewhere (file wins once written; env wins
/// on first boot).
pub fn load(path: &Path) -> Result<DnsConfig, ConfigStoreError> {
    if let Some(bytes) = read_json(path)? {
        if let Ok(config) = serde_json::from_slice::<DnsConfig>(&bytes) {
            return Ok(config);
        }
    }
    Ok(from_env())
}

pub fn save(path: &Path, config: &DnsConfig) -> Result<(), ConfigStoreError> {
    let bytes = serde_json::to_vec_pretty(config)?;
    write_json_atomic(path, &bytes)
}

fn from_env() -> DnsConfig {
    let mut config = DnsConfig::default();
    if let Ok(v) = std::env::var("DNS_CACHE_ENABLED") {
        config.enabled = v != "false" && v != "0";
    }
    if let Ok(v) = std::env::var("DNS_CACHE_TTL") {
        if let Ok(ttl) = v.parse() {
            config.ttl_ms = ttl;
        }
    }
    if let Ok(v) = std::env::var("DNS_CACHE_MAX_ENTRIES") {
        if let Ok(max) = v.parse() {
            config.max_entries = max;
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_falls_back_to_env_or_defaults() {
        std::env::remove_var("DNS_CACHE_TTL");
        let dir = tempdir().unwrap();
        let config = load(&dir.path().join("dns-cache-config.json")).unwrap();
        assert_eq!(config.ttl_ms, DnsConfig::default().ttl_ms);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dns-cache-config.json");
        let config = DnsConfig { enabled: false, ttl_ms: 30_000, max_entries: 50 };
        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.enabled, false);
        assert_eq!(loaded.ttl_ms, 30_000);
        assert_eq!(loaded.max_entries, 50);
    }
}
