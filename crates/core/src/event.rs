// SPDX-License-Identifier: MIT

//! The live-event vocabulary published over the SSE channel.
//! One server-sent event body is the JSON serialization of one `LiveEvent`.

use crate::analysis::AnalysisId;
use crate::log_entry::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LiveEvent {
    /// Initial snapshot of analyses sent on stream open.
    Init { analyses: Value },
    /// Status/enabled/pid fields diff for one analysis.
    AnalysisUpdate { analysis_id: AnalysisId, update: Value },
    AnalysisCreated { analysis: Value },
    AnalysisDeleted { analysis_id: AnalysisId },
    AnalysisRenamed { analysis_id: AnalysisId, name: String, restarted: bool },
    AnalysisStatus { analysis_id: AnalysisId, status: Value },
    /// Content update (source edited).
    AnalysisUpdated { analysis_id: AnalysisId, restarted: bool },
    AnalysisEnvironmentUpdated { analysis_id: AnalysisId },
    Log { analysis_id: AnalysisId, file_name: String, log: LogEntry, total_count: u64 },
    LogsCleared { analysis_id: AnalysisId, clear_message: Option<String> },
    AnalysisRolledBack { analysis_id: AnalysisId, version: u32, restarted: bool },
    AnalysisMovedToTeam { analysis_id: AnalysisId, team_id: String },
    TeamDeleted { team_id: String, analyses_moved_to: String },
    UserRoleUpdated { user_id: String },
    AdminUserRoleUpdated { user_id: String },
    UserTeamsUpdated { user_id: String },
    UserDeleted { user_id: String },
    MetricsUpdate { metrics: Value },
}

impl LiveEvent {
    /// The analysis this event concerns, if any — used by the fan-out to
    /// match against a session's subscription set.
    pub fn analysis_id(&self) -> Option<&AnalysisId> {
        match self {
            LiveEvent::AnalysisUpdate { analysis_id, .. }
            | LiveEvent::AnalysisDeleted { analysis_id }
            | LiveEvent::AnalysisRenamed { analysis_id, .. }
            | LiveEvent::AnalysisStatus { analysis_id, .. }
            | LiveEvent::AnalysisUpdated { analysis_id, .. }
            | LiveEvent::AnalysisEnvironmentUpdated { analysis_id }
            | LiveEvent::Log { analysis_id, .. }
            | LiveEvent::LogsCleared { analysis_id, .. }
            | LiveEvent::AnalysisRolledBack { analysis_id, .. }
            | LiveEvent::AnalysisMovedToTeam { analysis_id, .. } => Some(analysis_id),
            _ => None,
        }
    }
}
