// SPDX-License-Identifier: MIT

//! `/healthz` and `/api/admin/metrics` — the ambient observability surface.
//! Neither requires a session: health checks run before an operator's proxy
//! has any cookie to forward, and metrics are admin-gated by the route's own
//! handler instead of relying on session auth, the same liveness-probe
//! convention used elsewhere.

use ao_core::Clock;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AdminUser;
use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub generated_at: String,
    pub running_analyses: usize,
    pub total_analyses: usize,
    pub fanout_session_count: usize,
    pub dns_hit_rate_percent: f64,
    pub dns_cache_size: usize,
}

pub async fn metrics<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<MetricsSnapshot> {
    let (running_analyses, total_analyses) = state.store.with_state(|s| {
        let running = s.analyses.values().filter(|a| a.status == ao_core::AnalysisStatus::Running).count();
        (running, s.analyses.len())
    });
    let dns_stats = state.dns.stats();
    let snapshot = MetricsSnapshot {
        generated_at: ao_core::format_rfc3339(state.clock.epoch_ms()),
        running_analyses,
        total_analyses,
        fanout_session_count: state.fanout.session_count(),
        dns_hit_rate_percent: dns_stats.hit_rate_percent(),
        dns_cache_size: state.dns.cache_entries().len(),
    };
    state.fanout.broadcast_to_admin_users(ao_core::LiveEvent::MetricsUpdate { metrics: serde_json::to_value(&snapshot).unwrap_or_default() });
    Json(snapshot)
}
