// SPDX-License-Identifier: MIT

//! `/api/analyses/*` — the Supervisor and metadata-store surface.
//! Every handler here does exactly three things in order: rate-limit check,
//! permission check, delegate. Business logic lives in `ao-supervisor` and
//! `ao-storage`; this module only translates HTTP <-> those calls.

use ao_core::{AnalysisId, AnalysisStatus, Clock, LimiterClass, Permission};
use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::AuthedUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Checks the rate limiter for `class` keyed by the caller's user id, then
/// the permission resolver for `permission` scoped to `team_id`. Either
/// failure short-circuits with the appropriate status code.
fn check_rate_limit<C: Clock>(state: &AppState<C>, user: &AuthedUser, class: LimiterClass) -> Result<(), ApiError> {
    match state.rate_limiter.check(class, user.user_id.as_str()) {
        ao_access::RateLimitDecision::Allowed => Ok(()),
        ao_access::RateLimitDecision::Limited { retry_after_ms } => Err(ApiError::rate_limited(retry_after_ms)),
    }
}

fn check_permission<C: Clock>(state: &AppState<C>, user: &AuthedUser, team_id: &str, permission: Permission) -> Result<(), ApiError> {
    if state.permissions.is_allowed(&user.user_id, team_id, permission) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Forbidden"))
    }
}

fn find_analysis<C: Clock>(state: &AppState<C>, id: &AnalysisId) -> Result<ao_core::Analysis, ApiError> {
    state.store.with_state(|s| s.get_analysis(id).cloned()).ok_or_else(|| ApiError::not_found("analysis not found"))
}

pub async fn list<C: Clock>(State(state): State<AppState<C>>, user: AuthedUser) -> Result<Json<Vec<ao_core::Analysis>>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let allowed_teams = state.permissions.user_team_ids(&user.user_id, Permission::View);
    let analyses = state.store.with_state(|s| {
        s.analyses
            .values()
            .filter(|a| user.is_admin || allowed_teams.contains(&ao_core::TeamId::from_string(a.effective_team_id())))
            .cloned()
            .collect()
    });
    Ok(Json(analyses))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub name: String,
    pub file_name: String,
    pub content: String,
    pub team_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub analysis: ao_core::Analysis,
}

pub async fn upload<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    Json(body): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::Upload)?;
    let team_id = body.team_id.clone().unwrap_or_else(|| ao_core::UNCATEGORIZED_TEAM.to_string());
    check_permission(&state, &user, &team_id, Permission::Upload)?;

    if !ao_storage::safe_path::is_safe_filename(&body.file_name) {
        return Err(ApiError::invalid_file_path());
    }

    let analysis = ao_core::Analysis::new(body.name, body.team_id.clone());
    ao_storage::source_store::write_initial(&state.analysis_root, analysis.id.as_str(), &body.file_name, &body.content)?;
    state.store.append(ao_storage::event::StorageEvent::AnalysisCreated { analysis: analysis.clone() })?;
    state.fanout.broadcast_all(ao_core::LiveEvent::AnalysisCreated { analysis: serde_json::to_value(&analysis).unwrap_or_default() });

    Ok(Json(UploadResponse { analysis }))
}

pub async fn content<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<String, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::View)?;

    let (content, _file_name) = ao_storage::source_store::read_content(&state.analysis_root, id.as_str())?;
    Ok(content)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartableResponse {
    pub success: bool,
    pub restarted: bool,
}

pub async fn update<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<RestartableResponse>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Edit)?;

    let new_version = ao_storage::source_store::write_update(&state.analysis_root, id.as_str(), analysis.current_version, &body.content)?;
    state.store.append(ao_storage::event::StorageEvent::AnalysisVersionCommitted {
        analysis_id: id,
        version: new_version,
        created_at: state.clock.epoch_ms(),
        source_hash: content_hash(&body.content),
    })?;

    let restarted = maybe_restart(&state, &id, &analysis).await?;
    state.fanout.broadcast_update(ao_core::LiveEvent::AnalysisUpdated { analysis_id: id, restarted });
    Ok(Json(RestartableResponse { success: true, restarted }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub name: String,
}

pub async fn rename<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<RenameRequest>,
) -> Result<Json<RestartableResponse>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Edit)?;

    if body.name.contains('/') || body.name.trim().is_empty() {
        return Err(ApiError::validation(
            "invalid name",
            vec![ao_core::FieldError { path: "name".into(), message: "must not contain '/'".into(), code: "invalid".into() }],
        ));
    }

    state.store.append(ao_storage::event::StorageEvent::AnalysisRenamed { analysis_id: id, name: body.name.clone() })?;
    let restarted = false; // rename never requires restarting the child process
    state.fanout.broadcast_update(ao_core::LiveEvent::AnalysisRenamed { analysis_id: id, name: body.name, restarted });
    Ok(Json(RestartableResponse { success: true, restarted }))
}

pub async fn delete<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::Deletion)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Delete)?;

    state.supervisor.cleanup(&id).await?;
    state.store.append(ao_storage::event::StorageEvent::AnalysisDeleted { analysis_id: id })?;
    state.fanout.broadcast_update(ao_core::LiveEvent::AnalysisDeleted { analysis_id: id });
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn run<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::AnalysisRun)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Run)?;

    state.supervisor.start(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn stop<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Run)?;

    state.supervisor.stop(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    100
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub logs: Vec<ao_core::LogEntry>,
    pub has_more: bool,
    pub total: usize,
}

pub async fn logs<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::View)?;

    let (logs, has_more, total) = state.supervisor.get_memory_logs(&id, query.page, query.limit).await?;
    Ok(Json(LogsResponse { logs, has_more, total }))
}

#[derive(Deserialize)]
pub struct TimeRangeQuery {
    #[serde(default, rename = "timeRange")]
    pub time_range: Option<String>,
}

pub async fn logs_download<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<TimeRangeQuery>,
) -> Result<String, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Download)?;

    let cutoff_ms = time_range_cutoff(query.time_range.as_deref(), state.clock.epoch_ms());
    let path = ao_storage::safe_path::analysis_file_path(&state.analysis_root, id.as_str(), &["analysis.log"])
        .ok_or_else(ApiError::invalid_file_path)?;
    let text = std::fs::read_to_string(&path).unwrap_or_default();
    let filtered: String = text
        .lines()
        .filter(|line| match serde_json::from_str::<ao_core::LogEntry>(line) {
            Ok(entry) => cutoff_ms.map_or(true, |cutoff| entry.timestamp >= cutoff),
            Err(_) => true,
        })
        .map(|line| format!("{line}\n"))
        .collect();
    Ok(filtered)
}

fn time_range_cutoff(time_range: Option<&str>, now_ms: u64) -> Option<u64> {
    let window_ms = match time_range {
        Some("1h") => 3_600_000,
        Some("24h") => 86_400_000,
        Some("7d") => 7 * 86_400_000,
        Some("30d") => 30 * 86_400_000,
        _ => return None,
    };
    Some(now_ms.saturating_sub(window_ms))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearLogsRequest {
    pub clear_message: Option<String>,
}

pub async fn clear_logs<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    body: Option<Json<ClearLogsRequest>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::Deletion)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Delete)?;

    let clear_message = body.and_then(|Json(b)| b.clear_message);
    state.supervisor.clear_logs(&id, clear_message.as_deref()).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn versions<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Vec<ao_core::AnalysisVersion>>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::VersionOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::View)?;

    let versions = state.store.with_state(|s| s.versions.get(id.as_str()).cloned().unwrap_or_default());
    Ok(Json(versions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub version: u32,
}

pub async fn rollback<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<RollbackRequest>,
) -> Result<Json<RestartableResponse>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::VersionOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Edit)?;

    ao_storage::source_store::rollback(&state.analysis_root, id.as_str(), body.version)?;
    state.store.append(ao_storage::event::StorageEvent::AnalysisRolledBack { analysis_id: id, version: body.version })?;

    let restarted = maybe_restart(&state, &id, &analysis).await?;
    state.fanout.broadcast_update(ao_core::LiveEvent::AnalysisRolledBack { analysis_id: id, version: body.version, restarted });
    Ok(Json(RestartableResponse { success: true, restarted }))
}

pub async fn get_environment<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::View)?;

    let env = ao_storage::config_store::read_env(&state.analysis_root, id.as_str())?;
    Ok(Json(env.as_map()))
}

pub async fn put_environment<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<BTreeMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_rate_limit(&state, &user, LimiterClass::FileOperation)?;
    let id = AnalysisId::from_string(id);
    let analysis = find_analysis(&state, &id)?;
    check_permission(&state, &user, analysis.effective_team_id(), Permission::Edit)?;

    let mut env = ao_storage::config_store::EnvFile::default();
    for (key, value) in &body {
        env.set(key, value);
    }
    ao_storage::config_store::write_env(&state.analysis_root, id.as_str(), &env)?;
    state.fanout.broadcast_update(ao_core::LiveEvent::AnalysisEnvironmentUpdated { analysis_id: id });
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Content/rollback edits to a running analysis restart the child so the
/// new source takes effect, matching the source editor's "save while
/// running" behavior.
async fn maybe_restart<C: Clock>(state: &AppState<C>, id: &AnalysisId, analysis: &ao_core::Analysis) -> Result<bool, ApiError> {
    if analysis.status != AnalysisStatus::Running {
        return Ok(false);
    }
    state.supervisor.stop(id).await?;
    state.supervisor.start(id).await?;
    Ok(true)
}

fn content_hash(content: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
