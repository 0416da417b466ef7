// SPDX-License-Identifier: MIT

//! The in-memory projection rebuilt by replaying [`crate::event::StorageEvent`]s
//! from the WAL (or loaded whole from a snapshot and fast-forwarded with the
//! WAL tail after it).
//!
//! All handlers in [`MaterializedState::apply`] must be idempotent: the
//! daemon applies each event once during live operation and again, from
//! scratch, on every replay.

use crate::event::StorageEvent;
use ao_core::{Analysis, AnalysisId, AnalysisVersion, Folder, FolderId, Membership, Permission, Team, TeamId, User, UserId, UNCATEGORIZED_TEAM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub analyses: HashMap<String, Analysis>,
    pub versions: HashMap<String, Vec<AnalysisVersion>>,
    pub teams: HashMap<String, Team>,
    pub memberships: HashMap<(String, String), Membership>,
    pub users: HashMap<String, User>,
    pub folders: HashMap<String, Folder>,
}

impl MaterializedState {
    pub fn get_analysis(&self, id: &AnalysisId) -> Option<&Analysis> {
        self.analyses.get(id.as_str())
    }

    pub fn apply(&mut self, event: &StorageEvent) {
        match event {
            StorageEvent::AnalysisCreated { analysis } => {
                self.analyses.entry(analysis.id.as_str().to_string()).or_insert_with(|| analysis.clone());
            }
            StorageEvent::AnalysisDeleted { analysis_id } => {
                self.analyses.remove(analysis_id.as_str());
                self.versions.remove(analysis_id.as_str());
            }
            StorageEvent::AnalysisRenamed { analysis_id, name } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.name = name.clone();
                }
            }
            StorageEvent::AnalysisStatusChanged { analysis_id, status, pid } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.status = *status;
                    a.pid = *pid;
                }
            }
            StorageEvent::AnalysisEnabledSet { analysis_id, enabled } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.enabled = *enabled;
                }
            }
            StorageEvent::AnalysisIntendedStateSet { analysis_id, intended_state } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.intended_state = *intended_state;
                }
            }
            StorageEvent::AnalysisVersionCommitted { analysis_id, version, created_at, source_hash } => {
                let list = self.versions.entry(analysis_id.as_str().to_string()).or_default();
                if !list.iter().any(|v| v.version == *version) {
                    list.push(AnalysisVersion { version: *version, created_at: *created_at, source_hash: source_hash.clone() });
                }
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.current_version = (*version).max(a.current_version);
                }
            }
            StorageEvent::AnalysisRolledBack { analysis_id, version } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.current_version = *version;
                }
            }
            StorageEvent::AnalysisMovedToTeam { analysis_id, team_id } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.team_id = team_id.clone();
                }
            }
            StorageEvent::AnalysisMovedToFolder { analysis_id, folder_id } => {
                if let Some(a) = self.analyses.get_mut(analysis_id.as_str()) {
                    a.folder_id = folder_id.as_ref().map(|f| f.as_str().to_string());
                }
            }
            StorageEvent::TeamCreated { team } => {
                self.teams.entry(team.id.as_str().to_string()).or_insert_with(|| team.clone());
            }
            StorageEvent::TeamRenamed { team_id, name } => {
                if let Some(t) = self.teams.get_mut(team_id.as_str()) {
                    t.name = name.clone();
                }
            }
            StorageEvent::TeamReordered { team_id, order_index } => {
                if let Some(t) = self.teams.get_mut(team_id.as_str()) {
                    t.order_index = (*order_index).max(0) as u32;
                }
            }
            StorageEvent::TeamDeleted { team_id } => {
                self.teams.remove(team_id.as_str());
                self.memberships.retain(|(_, t), _| t != team_id.as_str());
                for analysis in self.analyses.values_mut() {
                    if analysis.team_id.as_deref() == Some(team_id.as_str()) {
                        analysis.team_id = None; // falls back to UNCATEGORIZED_TEAM
                    }
                }
            }
            StorageEvent::MembershipGranted { user_id, team_id, permissions } => {
                let key = (user_id.as_str().to_string(), team_id.as_str().to_string());
                let entry = self.memberships.entry(key).or_insert_with(|| Membership {
                    user_id: *user_id,
                    team_id: *team_id,
                    permissions: Default::default(),
                });
                entry.permissions.extend(permissions.iter().copied());
            }
            StorageEvent::MembershipRevoked { user_id, team_id } => {
                self.memberships.remove(&(user_id.as_str().to_string(), team_id.as_str().to_string()));
            }
            StorageEvent::UserCreated { user } => {
                self.users.entry(user.id.as_str().to_string()).or_insert_with(|| user.clone());
            }
            StorageEvent::UserRoleSet { user_id, is_admin } => {
                if let Some(u) = self.users.get_mut(user_id.as_str()) {
                    u.is_admin = *is_admin;
                }
            }
            StorageEvent::UserDeleted { user_id } => {
                self.users.remove(user_id.as_str());
                self.memberships.retain(|(u, _), _| u != user_id.as_str());
            }
            StorageEvent::FolderCreated { folder } => {
                self.folders.entry(folder.id.as_str().to_string()).or_insert_with(|| folder.clone());
            }
            StorageEvent::FolderRenamed { folder_id, name } => {
                if let Some(f) = self.folders.get_mut(folder_id.as_str()) {
                    f.name = name.clone();
                }
            }
            StorageEvent::FolderDeleted { folder_id } => {
                self.folders.remove(folder_id.as_str());
            }
            StorageEvent::Shutdown => {}
        }
    }

    /// Permission set a user holds over analyses owned by `team_id`, empty
    /// if there is no membership (admin bypass is resolved by the caller).
    pub fn permissions_for(&self, user_id: &UserId, team_id: &str) -> std::collections::HashSet<Permission> {
        self.memberships
            .get(&(user_id.as_str().to_string(), team_id.to_string()))
            .map(|m| m.permissions.clone())
            .unwrap_or_default()
    }

    pub fn team_name(&self, team_id: &str) -> &str {
        if team_id == UNCATEGORIZED_TEAM {
            return UNCATEGORIZED_TEAM;
        }
        self.teams.get(team_id).map(|t| t.name.as_str()).unwrap_or(UNCATEGORIZED_TEAM)
    }

    pub fn folder(&self, id: &FolderId) -> Option<&Folder> {
        self.folders.get(id.as_str())
    }
}
