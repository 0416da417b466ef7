// SPDX-License-Identifier: MIT

//! The `Analysis` aggregate — a named, versioned user script owned by a team.

use crate::define_id;
use serde::{Deserialize, Serialize};

define_id! {
    /// Stable identifier for an analysis, independent of its current version.
    pub struct AnalysisId("an-");
}

/// Reserved team id that analyses fall back to when their explicit team is deleted.
pub const UNCATEGORIZED_TEAM: &str = "uncategorized";

/// Observed runtime status of an analysis's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Stopped,
    Running,
    Error,
}

/// The operator's most recent wish for the analysis, independent of observed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntendedState {
    Stopped,
    Running,
}

/// Logical script unit, identified by a stable UUID-shaped id and a human name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub name: String,
    pub status: AnalysisStatus,
    pub enabled: bool,
    pub intended_state: IntendedState,
    /// `None` means the reserved `uncategorized` team.
    pub team_id: Option<String>,
    pub last_start_time: Option<u64>,
    pub current_version: u32,
    pub pid: Option<u32>,
    pub folder_id: Option<String>,
}

impl Analysis {
    pub fn new(name: impl Into<String>, team_id: Option<String>) -> Self {
        Self {
            id: AnalysisId::new(),
            name: name.into(),
            status: AnalysisStatus::Stopped,
            enabled: true,
            intended_state: IntendedState::Stopped,
            team_id,
            last_start_time: None,
            current_version: 1,
            pid: None,
            folder_id: None,
        }
    }

    /// `team_id` resolved with the reserved fallback applied.
    pub fn effective_team_id(&self) -> &str {
        self.team_id.as_deref().unwrap_or(UNCATEGORIZED_TEAM)
    }

    /// Invariant: if a child process is attached, status must be `Running`.
    pub fn invariant_holds(&self) -> bool {
        (self.pid.is_some()) == (self.status == AnalysisStatus::Running)
    }
}

/// A single source snapshot, written before every upload/edit that changes
/// `currentVersion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisVersion {
    pub version: u32,
    pub created_at: u64,
    pub source_hash: String,
}
