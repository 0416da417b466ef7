// SPDX-License-Identifier: MIT

//! SSRF policy applied at two points: before a hostname is ever handed to
//! the OS resolver, and to every address the OS resolver returns before it
//! reaches the cache or the child.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsrfPolicy {
    /// When true, private/loopback addresses are allowed through (used in
    /// local development, never in production).
    pub allow_private_addresses: bool,
}

impl Default for SsrfPolicy {
    fn default() -> Self {
        Self { allow_private_addresses: false }
    }
}

/// Hostnames that are obviously loopback/metadata aliases, rejected before
/// any network round-trip.
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "metadata.google.internal",
    "metadata.internal",
];

/// Cloud-metadata address blocked unconditionally, regardless of
/// `allow_private_addresses` — no legitimate analysis needs it and it is
/// the single highest-value SSRF target.
const METADATA_ADDR: &str = "169.254.169.254";

impl SsrfPolicy {
    /// Validates a hostname before it is ever handed to the OS resolver.
    /// Returns `Err(reason)` when the hostname itself is disallowed.
    pub fn validate_hostname(&self, hostname: &str) -> Result<(), String> {
        let lower = hostname.to_ascii_lowercase();
        if BLOCKED_HOSTNAMES.contains(&lower.as_str()) {
            return Err(format!("Hostname '{hostname}' is blocked"));
        }
        if let Ok(ip) = lower.parse::<IpAddr>() {
            return self.validate_address(&ip);
        }
        Ok(())
    }

    /// Step 3: validate each address the OS resolver returned.
    pub fn validate_address(&self, addr: &IpAddr) -> Result<(), String> {
        if addr.to_string() == METADATA_ADDR {
            return Err("Cloud metadata address blocked".to_string());
        }
        if self.allow_private_addresses {
            return Ok(());
        }
        if is_disallowed(addr) {
            return Err(disallowed_reason(addr));
        }
        Ok(())
    }

    pub fn validate_addresses(&self, addrs: &[IpAddr]) -> Result<(), String> {
        for addr in addrs {
            self.validate_address(addr)?;
        }
        Ok(())
    }
}

fn is_disallowed(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || is_unique_local_v6(v6),
    }
}

fn is_unique_local_v6(v6: &std::net::Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

fn disallowed_reason(addr: &IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) if v4.is_link_local() => "Link-local IP address blocked".to_string(),
        _ => "Private IP address blocked".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_hostname_passes() {
        let policy = SsrfPolicy::default();
        assert!(policy.validate_hostname("public.example").is_ok());
    }

    #[test]
    fn localhost_is_blocked() {
        let policy = SsrfPolicy::default();
        assert!(policy.validate_hostname("localhost").is_err());
    }

    #[test]
    fn private_resolved_address_is_blocked() {
        // a public hostname resolving to a loopback address is still blocked
        let policy = SsrfPolicy::default();
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        let err = policy.validate_address(&addr).unwrap_err();
        assert_eq!(err, "Private IP address blocked");
    }

    #[test]
    fn private_range_is_blocked() {
        let policy = SsrfPolicy::default();
        let addr: IpAddr = "10.0.0.5".parse().unwrap();
        assert!(policy.validate_address(&addr).is_err());
    }

    #[test]
    fn metadata_address_blocked_even_when_private_allowed() {
        let policy = SsrfPolicy { allow_private_addresses: true };
        let addr: IpAddr = "169.254.169.254".parse().unwrap();
        assert!(policy.validate_address(&addr).is_err());
    }

    #[test]
    fn allow_private_flag_permits_private_ranges() {
        let policy = SsrfPolicy { allow_private_addresses: true };
        let addr: IpAddr = "192.168.1.10".parse().unwrap();
        assert!(policy.validate_address(&addr).is_ok());
    }

    #[test]
    fn public_address_passes() {
        let policy = SsrfPolicy::default();
        let addr: IpAddr = "93.184.216.34".parse().unwrap();
        assert!(policy.validate_address(&addr).is_ok());
    }
}
