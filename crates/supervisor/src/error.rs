// SPDX-License-Identifier: MIT

//! Error taxonomy for the Analysis Supervisor.

use ao_core::{AnalysisId, ErrorKind, HasErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("analysis {0} not found")]
    NotFound(AnalysisId),
    /// Covers both "a start is already in flight" and "a child is already
    /// running" — `start()`'s precondition collapses both into
    /// one failure mode for the caller.
    #[error("a start or stop is already in progress for analysis {0}")]
    AlreadyStarting(AnalysisId),
    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error(transparent)]
    Store(#[from] ao_storage::StoreError),
    #[error(transparent)]
    LogPipeline(#[from] ao_storage::log_pipeline::LogPipelineError),
    #[error(transparent)]
    ConfigStore(#[from] ao_storage::config_store::ConfigStoreError),
}

impl HasErrorKind for SupervisorError {
    fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::NotFound(_) => ErrorKind::NotFound,
            SupervisorError::AlreadyStarting(_) => ErrorKind::Conflict,
            SupervisorError::SpawnFailed(_) => ErrorKind::Internal,
            SupervisorError::Store(_) => ErrorKind::Internal,
            SupervisorError::LogPipeline(_) => ErrorKind::Internal,
            SupervisorError::ConfigStore(_) => ErrorKind::Internal,
        }
    }
}
