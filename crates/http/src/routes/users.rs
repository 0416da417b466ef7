// SPDX-License-Identifier: MIT

//! `/api/users/*` — admin-scoped user and membership CRUD. "Member
//! not found" on org-remove maps to 404.

use ao_core::{Clock, Permission, TeamId, User, UserId};
use axum::extract::{Path as AxumPath, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list<C: Clock>(State(state): State<AppState<C>>, _admin: AdminUser) -> Json<Vec<User>> {
    Json(state.store.with_state(|s| s.users.values().cloned().collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub is_admin: bool,
}

pub async fn update_role<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::from_string(id);
    ensure_user_exists(&state, &user_id)?;

    state.store.append(ao_storage::event::StorageEvent::UserRoleSet { user_id, is_admin: body.is_admin })?;
    state.fanout.send_to_user(user_id.as_str(), ao_core::LiveEvent::AdminUserRoleUpdated { user_id: user_id.as_str().to_string() });
    state.fanout.broadcast_to_admin_users(ao_core::LiveEvent::UserRoleUpdated { user_id: user_id.as_str().to_string() });
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTeamsRequest {
    pub team_id: String,
    pub permissions: Vec<Permission>,
}

pub async fn grant_membership<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<SetTeamsRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::from_string(id);
    ensure_user_exists(&state, &user_id)?;
    let team_id = TeamId::from_string(body.team_id);

    state.store.append(ao_storage::event::StorageEvent::MembershipGranted { user_id, team_id, permissions: body.permissions })?;
    state.fanout.refresh_init_data_for_user(user_id.as_str());
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn revoke_membership<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath((id, team_id)): AxumPath<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::from_string(id);
    let team_id = TeamId::from_string(team_id);
    let membership_exists = state
        .store
        .with_state(|s| s.memberships.contains_key(&(user_id.as_str().to_string(), team_id.as_str().to_string())));
    if !membership_exists {
        return Err(ApiError::not_found("Member not found"));
    }

    state.store.append(ao_storage::event::StorageEvent::MembershipRevoked { user_id, team_id })?;
    state.fanout.refresh_init_data_for_user(user_id.as_str());
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn delete<C: Clock>(
    State(state): State<AppState<C>>,
    _admin: AdminUser,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = UserId::from_string(id);
    ensure_user_exists(&state, &user_id)?;

    state.store.append(ao_storage::event::StorageEvent::UserDeleted { user_id })?;
    state.fanout.send_to_user(user_id.as_str(), ao_core::LiveEvent::UserDeleted { user_id: user_id.as_str().to_string() });
    Ok(Json(serde_json::json!({ "success": true })))
}

fn ensure_user_exists<C: Clock>(state: &AppState<C>, user_id: &UserId) -> Result<(), ApiError> {
    let exists = state.store.with_state(|s| s.users.contains_key(user_id.as_str()));
    if exists {
        Ok(())
    } else {
        Err(ApiError::not_found("user not found"))
    }
}
