// SPDX-License-Identifier: MIT

//! Periodic zstd-compressed snapshot of [`MaterializedState`], so recovery
//! after a restart doesn't have to replay the WAL from the beginning of time.

use crate::migration::MigrationRegistry;
use crate::state::MaterializedState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Snapshot format version this binary writes and expects after migration.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot migration error: {0}")]
    Migration(#[from] crate::migration::MigrationError),
}

#[derive(Serialize, Deserialize)]
struct SnapshotEnvelope {
    v: u32,
    seq: u64,
    state: Value,
}

pub struct Snapshot;

impl Snapshot {
    /// Atomically writes `state` compressed with zstd, via a temp-file +
    /// rename so a crash mid-write never leaves a half-written snapshot.
    pub fn write(path: impl AsRef<Path>, seq: u64, state: &MaterializedState) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let envelope = SnapshotEnvelope { v: CURRENT_SNAPSHOT_VERSION, seq, state: serde_json::to_value(state)? };
        let json = serde_json::to_vec(&envelope)?;
        let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &compressed)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Reads back a snapshot, migrating it to [`CURRENT_SNAPSHOT_VERSION`] if
    /// it was written by an older build. Returns `None` if no snapshot exists
    /// yet (first boot).
    pub fn read(
        path: impl AsRef<Path>,
        migrations: &MigrationRegistry,
    ) -> Result<Option<(u64, MaterializedState)>, SnapshotError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let compressed = std::fs::read(path)?;
        let mut decoder = zstd::Decoder::new(&compressed[..])?;
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;

        let envelope: SnapshotEnvelope = serde_json::from_slice(&json)?;
        let migrated = migrations.migrate_to(
            serde_json::json!({"v": envelope.v, "seq": envelope.seq, "state": envelope.state}),
            CURRENT_SNAPSHOT_VERSION,
        )?;
        let seq = migrated["seq"].as_u64().unwrap_or(envelope.seq);
        let state: MaterializedState = serde_json::from_value(migrated["state"].clone())?;
        Ok(Some((seq, state)))
    }
}
