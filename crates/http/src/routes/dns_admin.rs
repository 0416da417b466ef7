// SPDX-License-Identifier: MIT

//! `/api/dns/*` — admin-only surface over the shared resolver's cache and
//! control plane: read/update cache config and inspect cached entries.

use ao_core::{Clock, DnsCacheEntrySnapshot, DnsConfig, DnsStats};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_config<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<DnsConfig> {
    Json(state.dns.config())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub enabled: Option<bool>,
    pub ttl_ms: Option<u64>,
    pub max_entries: Option<usize>,
}

pub async fn update_config<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    Json(body): Json<UpdateConfigRequest>,
) -> Result<Json<DnsConfig>, ApiError> {
    state.dns.update_config(body.enabled, body.ttl_ms, body.max_entries);
    let config = state.dns.config();

    let path = state.config_root.join("dns-cache-config.json");
    ao_dns::config::save(&path, &config)?;

    Ok(Json(config))
}

pub async fn stats<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<DnsStats> {
    Json(state.dns.stats())
}

pub async fn entries<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<Vec<DnsCacheEntrySnapshot>> {
    Json(state.dns.cache_entries())
}

pub async fn clear_cache<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<serde_json::Value> {
    let removed = state.dns.clear_cache();
    Json(serde_json::json!({ "removed": removed }))
}
