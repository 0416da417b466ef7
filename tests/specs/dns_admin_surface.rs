// SPDX-License-Identifier: MIT

//! The DNS service's control surface persisted through the safe-path-gated
//! config writer, then reloaded into a fresh service instance — the actual
//! seam between `ao-dns` and `ao-storage` that the daemon relies on at
//! startup: `updateConfig(c)` followed by `getConfig()` returns a value
//! equal to `c`, even across a fresh service instance.

use ao_core::{DnsConfig, FakeClock};
use ao_dns::{DnsService, SsrfPolicy};
use tempfile::tempdir;

#[tokio::test]
async fn update_config_persists_across_a_fresh_service_instance() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("dns-cache-config.json");

    let clock = FakeClock::new();
    let initial = ao_dns::config::load(&config_path).unwrap();
    let service = DnsService::new(clock.clone(), initial, SsrfPolicy::default()).unwrap();
    service.update_config(Some(false), Some(45_000), Some(7));
    ao_dns::config::save(&config_path, &service.config()).unwrap();

    // simulate a restart: a brand new service loads the same file.
    let reloaded_config = ao_dns::config::load(&config_path).unwrap();
    let service_2 = DnsService::new(clock, reloaded_config, SsrfPolicy::default()).unwrap();

    assert_eq!(service_2.config().enabled, service.config().enabled);
    assert_eq!(service_2.config().ttl_ms, service.config().ttl_ms);
    assert_eq!(service_2.config().max_entries, service.config().max_entries);
    assert!(!service_2.enabled());
    assert_eq!(service_2.config().ttl_ms, 45_000);
    assert_eq!(service_2.config().max_entries, 7);
}

#[tokio::test]
async fn ssrf_blocked_lookup_increments_errors_and_never_populates_cache() {
    // driven through the service rather than the bare SsrfPolicy/DnsCache
    // units.
    let service = DnsService::new(FakeClock::new(), DnsConfig { enabled: true, ttl_ms: 60_000, max_entries: 10 }, SsrfPolicy::default()).unwrap();

    let response = service
        .handle_request(ao_dns::DnsRequest::Lookup { request_id: "r-1".into(), hostname: "localhost".into(), family: None })
        .await;
    match response {
        ao_dns::DnsResponse::Lookup { success, error, .. } => {
            assert!(!success);
            assert!(error.is_some());
        }
        other => panic!("unexpected response variant: {other:?}"),
    }
    assert_eq!(service.stats().errors, 1);
    assert!(service.cache_entries().is_empty());
}
