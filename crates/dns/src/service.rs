// SPDX-License-Identifier: MIT

//! Ties the cache, SSRF policy, and the real OS resolver together into the
//! per-request handling every IPC request goes through, plus the
//! `updateConfig`/cache-admin control surface.

use crate::cache::{lookup_key, resolve4_key, resolve6_key, DnsCache};
use crate::protocol::{DnsRequest, DnsResponse};
use crate::ssrf::SsrfPolicy;
use ao_core::{AddressFamily, Clock, DnsCacheEntrySnapshot, DnsCacheValue, DnsConfig, DnsStats};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

pub struct DnsService<C: Clock> {
    cache: DnsCache<C>,
    policy: SsrfPolicy,
    resolver: TokioAsyncResolver,
    enabled: AtomicBool,
}

impl<C: Clock> DnsService<C> {
    pub fn new(clock: C, config: DnsConfig, policy: SsrfPolicy) -> Result<Self, hickory_resolver::error::ResolveError> {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Ok(Self {
            cache: DnsCache::new(clock, config.ttl_ms, config.max_entries),
            policy,
            resolver,
            enabled: AtomicBool::new(config.enabled),
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> DnsConfig {
        DnsConfig { enabled: self.enabled(), ttl_ms: self.cache.ttl_ms(), max_entries: self.cache.max_entries() }
    }

    /// `updateConfig`, the cache's control surface. Changing `ttl` resets
    /// statistics; changing `enabled` is observed by callers via
    /// [`DnsService::enabled`] to install/uninstall the IPC handler.
    pub fn update_config(&self, enabled: Option<bool>, ttl_ms: Option<u64>, max_entries: Option<usize>) {
        if let Some(enabled) = enabled {
            self.enabled.store(enabled, Ordering::Relaxed);
        }
        let new_ttl = ttl_ms.unwrap_or_else(|| self.cache.ttl_ms());
        let new_max = max_entries.unwrap_or_else(|| self.cache.max_entries());
        self.cache.reconfigure(new_ttl, new_max);
    }

    pub fn stats(&self) -> DnsStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub fn cache_entries(&self) -> Vec<DnsCacheEntrySnapshot> {
        self.cache.entries()
    }

    /// Dispatches one IPC request to its handler and always produces exactly
    /// one response — the parent must answer every request it receives,
    /// success or failure, so a child never hangs waiting on a reply.
    pub async fn handle_request(&self, request: DnsRequest) -> DnsResponse {
        match request {
            DnsRequest::Lookup { request_id, hostname, family } => self.handle_lookup(&request_id, &hostname, family.unwrap_or(AddressFamily::Unspecified)).await,
            DnsRequest::Resolve4 { request_id, hostname } => self.handle_resolve4(&request_id, &hostname).await,
            DnsRequest::Resolve6 { request_id, hostname } => self.handle_resolve6(&request_id, &hostname).await,
        }
    }

    async fn handle_lookup(&self, request_id: &str, hostname: &str, family: AddressFamily) -> DnsResponse {
        if let Err(reason) = self.policy.validate_hostname(hostname) {
            self.cache.record_error();
            return DnsResponse::lookup_err(request_id, reason);
        }

        let key = lookup_key(hostname, family);
        if let Some(DnsCacheValue::Lookup { address, family }) = self.cache.get(&key) {
            return DnsResponse::lookup_ok(request_id, address, family);
        }

        let response = self.resolver.lookup_ip(hostname).await;
        match response {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                let chosen = match family {
                    AddressFamily::V4 => addrs.iter().find(|a| a.is_ipv4()).copied(),
                    AddressFamily::V6 => addrs.iter().find(|a| a.is_ipv6()).copied(),
                    AddressFamily::Unspecified => addrs.first().copied(),
                };
                let Some(addr) = chosen else {
                    self.cache.record_error();
                    return DnsResponse::lookup_err(request_id, "No address of the requested family");
                };
                if let Err(reason) = self.policy.validate_address(&addr) {
                    self.cache.record_error();
                    return DnsResponse::lookup_err(request_id, reason);
                }
                let resolved_family = if addr.is_ipv4() { AddressFamily::V4 } else { AddressFamily::V6 };
                self.cache.insert(key, DnsCacheValue::Lookup { address: addr.to_string(), family: resolved_family });
                DnsResponse::lookup_ok(request_id, addr.to_string(), resolved_family)
            }
            Err(e) => {
                self.cache.record_error();
                DnsResponse::lookup_err(request_id, e.to_string())
            }
        }
    }

    async fn handle_resolve4(&self, request_id: &str, hostname: &str) -> DnsResponse {
        if let Err(reason) = self.policy.validate_hostname(hostname) {
            self.cache.record_error();
            return DnsResponse::resolve4_err(request_id, reason);
        }
        let key = resolve4_key(hostname);
        if let Some(DnsCacheValue::Resolve4 { addresses }) = self.cache.get(&key) {
            return DnsResponse::resolve4_ok(request_id, addresses);
        }
        match self.resolver.ipv4_lookup(hostname).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().map(|a| IpAddr::V4(a.0)).collect();
                if let Err(reason) = self.policy.validate_addresses(&addrs) {
                    self.cache.record_error();
                    return DnsResponse::resolve4_err(request_id, reason);
                }
                let addresses: Vec<String> = addrs.iter().map(IpAddr::to_string).collect();
                self.cache.insert(key, DnsCacheValue::Resolve4 { addresses: addresses.clone() });
                DnsResponse::resolve4_ok(request_id, addresses)
            }
            Err(e) => {
                self.cache.record_error();
                DnsResponse::resolve4_err(request_id, e.to_string())
            }
        }
    }

    async fn handle_resolve6(&self, request_id: &str, hostname: &str) -> DnsResponse {
        if let Err(reason) = self.policy.validate_hostname(hostname) {
            self.cache.record_error();
            return DnsResponse::resolve6_err(request_id, reason);
        }
        let key = resolve6_key(hostname);
        if let Some(DnsCacheValue::Resolve6 { addresses }) = self.cache.get(&key) {
            return DnsResponse::resolve6_ok(request_id, addresses);
        }
        match self.resolver.ipv6_lookup(hostname).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().map(|a| IpAddr::V6(a.0)).collect();
                if let Err(reason) = self.policy.validate_addresses(&addrs) {
                    self.cache.record_error();
                    return DnsResponse::resolve6_err(request_id, reason);
                }
                let addresses: Vec<String> = addrs.iter().map(IpAddr::to_string).collect();
                self.cache.insert(key, DnsCacheValue::Resolve6 { addresses: addresses.clone() });
                DnsResponse::resolve6_ok(request_id, addresses)
            }
            Err(e) => {
                self.cache.record_error();
                DnsResponse::resolve6_err(request_id, e.to_string())
            }
        }
    }

    /// Logged-and-ignored path for a message whose `type` discriminant
    /// didn't deserialize into [`DnsRequest`] — unknown discriminants are
    /// rejected with a logged warning rather than a panic.
    pub fn reject_unknown(raw_type: &str) {
        warn!(message_type = raw_type, "ignoring unknown IPC message type from child");
    }
}
