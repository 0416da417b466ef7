// SPDX-License-Identifier: MIT

//! The IPC wire contract between the parent and every child worker. Each
//! request carries a `requestId` allocated by the child; the parent echoes
//! it back on the matching response. Unknown discriminants are rejected with
//! a logged warning rather than a panic.

use ao_core::AddressFamily;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DnsRequest {
    #[serde(rename = "DNS_LOOKUP_REQUEST")]
    Lookup { request_id: String, hostname: String, family: Option<AddressFamily> },
    #[serde(rename = "DNS_RESOLVE4_REQUEST")]
    Resolve4 { request_id: String, hostname: String },
    #[serde(rename = "DNS_RESOLVE6_REQUEST")]
    Resolve6 { request_id: String, hostname: String },
}

impl DnsRequest {
    pub fn request_id(&self) -> &str {
        match self {
            DnsRequest::Lookup { request_id, .. }
            | DnsRequest::Resolve4 { request_id, .. }
            | DnsRequest::Resolve6 { request_id, .. } => request_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DnsResponse {
    #[serde(rename = "DNS_LOOKUP_RESPONSE")]
    Lookup { request_id: String, success: bool, address: Option<String>, family: Option<AddressFamily>, error: Option<String> },
    #[serde(rename = "DNS_RESOLVE4_RESPONSE")]
    Resolve4 { request_id: String, success: bool, addresses: Vec<String>, error: Option<String> },
    #[serde(rename = "DNS_RESOLVE6_RESPONSE")]
    Resolve6 { request_id: String, success: bool, addresses: Vec<String>, error: Option<String> },
}

impl DnsResponse {
    pub fn lookup_ok(request_id: &str, address: String, family: AddressFamily) -> Self {
        DnsResponse::Lookup { request_id: request_id.to_string(), success: true, address: Some(address), family: Some(family), error: None }
    }

    pub fn lookup_err(request_id: &str, error: impl Into<String>) -> Self {
        DnsResponse::Lookup { request_id: request_id.to_string(), success: false, address: None, family: None, error: Some(error.into()) }
    }

    pub fn resolve4_ok(request_id: &str, addresses: Vec<String>) -> Self {
        DnsResponse::Resolve4 { request_id: request_id.to_string(), success: true, addresses, error: None }
    }

    pub fn resolve4_err(request_id: &str, error: impl Into<String>) -> Self {
        DnsResponse::Resolve4 { request_id: request_id.to_string(), success: false, addresses: Vec::new(), error: Some(error.into()) }
    }

    pub fn resolve6_ok(request_id: &str, addresses: Vec<String>) -> Self {
        DnsResponse::Resolve6 { request_id: request_id.to_string(), success: true, addresses, error: None }
    }

    pub fn resolve6_err(request_id: &str, error: impl Into<String>) -> Self {
        DnsResponse::Resolve6 { request_id: request_id.to_string(), success: false, addresses: Vec::new(), error: Some(error.into()) }
    }
}

/// Timeout a child arms on every outbound request before failing its
/// pending future with "DNS timeout".
pub const CHILD_REQUEST_TIMEOUT_MS: u64 = 10_000;
