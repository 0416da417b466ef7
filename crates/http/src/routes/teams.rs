// SPDX-License-Identifier: MIT

//! `/api/teams/*` — admin-scoped team CRUD. Thin wrappers over the
//! metadata store; no Supervisor or DNS interaction.

use ao_core::{Clock, Team, TeamId};
use axum::extract::{Path as AxumPath, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<Vec<Team>> {
    let mut teams: Vec<Team> = state.store.with_state(|s| s.teams.values().cloned().collect());
    teams.sort_by_key(|t| t.order_index);
    Json(teams)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamRequest {
    pub name: String,
    pub color: String,
}

pub async fn create<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<Team>, ApiError> {
    let order_index = state.store.with_state(|s| s.teams.len() as u32);
    let team = Team { id: TeamId::new(), name: body.name, color: body.color, order_index };
    state.store.append(ao_storage::event::StorageEvent::TeamCreated { team: team.clone() })?;
    Ok(Json(team))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTeamRequest {
    pub name: String,
}

pub async fn rename<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<RenameTeamRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team_id = TeamId::from_string(id);
    ensure_team_exists(&state, &team_id)?;
    state.store.append(ao_storage::event::StorageEvent::TeamRenamed { team_id, name: body.name })?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn delete<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team_id = TeamId::from_string(id);
    ensure_team_exists(&state, &team_id)?;

    state.store.append(ao_storage::event::StorageEvent::TeamDeleted { team_id })?;
    state.fanout.broadcast_all(ao_core::LiveEvent::TeamDeleted {
        team_id: team_id.as_str().to_string(),
        analyses_moved_to: ao_core::UNCATEGORIZED_TEAM.to_string(),
    });
    Ok(Json(serde_json::json!({ "success": true })))
}

fn ensure_team_exists<C: Clock>(state: &AppState<C>, team_id: &TeamId) -> Result<(), ApiError> {
    let exists = state.store.with_state(|s| s.teams.contains_key(team_id.as_str()));
    if exists {
        Ok(())
    } else {
        Err(ApiError::not_found("team not found"))
    }
}
