// SPDX-License-Identifier: MIT

//! The durable event vocabulary written to the WAL. Distinct from
//! `ao_core::LiveEvent`: this is what gets persisted and replayed, the other
//! is what gets pushed out over SSE. A single mutation in the metadata store
//! usually produces one of these and, downstream, zero or more `LiveEvent`s.

use ao_core::{Analysis, AnalysisId, AnalysisStatus, Folder, FolderId, IntendedState, Permission, Team, TeamId, User, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StorageEvent {
    AnalysisCreated { analysis: Analysis },
    AnalysisDeleted { analysis_id: AnalysisId },
    AnalysisRenamed { analysis_id: AnalysisId, name: String },
    AnalysisStatusChanged { analysis_id: AnalysisId, status: AnalysisStatus, pid: Option<u32> },
    AnalysisEnabledSet { analysis_id: AnalysisId, enabled: bool },
    AnalysisIntendedStateSet { analysis_id: AnalysisId, intended_state: IntendedState },
    AnalysisVersionCommitted { analysis_id: AnalysisId, version: u32, created_at: u64, source_hash: String },
    AnalysisRolledBack { analysis_id: AnalysisId, version: u32 },
    AnalysisMovedToTeam { analysis_id: AnalysisId, team_id: Option<String> },
    AnalysisMovedToFolder { analysis_id: AnalysisId, folder_id: Option<FolderId> },
    TeamCreated { team: Team },
    TeamRenamed { team_id: TeamId, name: String },
    TeamReordered { team_id: TeamId, order_index: i64 },
    TeamDeleted { team_id: TeamId },
    MembershipGranted { user_id: UserId, team_id: TeamId, permissions: Vec<Permission> },
    MembershipRevoked { user_id: UserId, team_id: TeamId },
    UserCreated { user: User },
    UserRoleSet { user_id: UserId, is_admin: bool },
    UserDeleted { user_id: UserId },
    FolderCreated { folder: Folder },
    FolderRenamed { folder_id: FolderId, name: String },
    FolderDeleted { folder_id: FolderId },
    /// Control event, never applied to state — lets the daemon's replay
    /// loop recognize a clean-shutdown marker and stop without error.
    Shutdown,
}
