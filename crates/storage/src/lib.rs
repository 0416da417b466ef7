// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-storage: the event-sourced metadata store, the
//! append-only WAL and zstd snapshot it is built on, the per-analysis config
//! file I/O (`.env`, `dns-cache-config.json`), the safe-path utility every
//! filesystem access in the workspace is routed through, and the NDJSON
//! child-log pipeline's on-disk half.

pub mod config_store;
pub mod event;
pub mod log_pipeline;
pub mod migration;
pub mod safe_path;
pub mod snapshot;
pub mod source_store;
pub mod state;

use ao_core::{ErrorKind, HasErrorKind};
use event::StorageEvent;
use migration::MigrationRegistry;
use parking_lot::RwLock;
use snapshot::Snapshot;
use state::MaterializedState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wal::Wal;

mod wal;
pub use wal::{WalEntry, WalError};

const WAL_FILE_NAME: &str = "metadata.wal";
const SNAPSHOT_FILE_NAME: &str = "metadata.snapshot.zst";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] snapshot::SnapshotError),
    #[error("metadata io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasErrorKind for StoreError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Single-writer, many-reader metadata store: every mutation is appended to
/// the WAL and applied to the in-memory [`MaterializedState`] before the
/// call returns — a single writer task owns every mutation.
/// Reads clone out of an `RwLock` so readers never block each other or the
/// writer for longer than a memcpy.
pub struct MetadataStore {
    root: PathBuf,
    wal: parking_lot::Mutex<Wal<StorageEvent>>,
    state: Arc<RwLock<MaterializedState>>,
}

impl MetadataStore {
    /// Opens the store at `root`, replaying the WAL onto the last snapshot
    /// (or an empty state, on first run).
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let snapshot_path = root.join(SNAPSHOT_FILE_NAME);
        let migrations = MigrationRegistry::new();
        let (processed_seq, mut state) = match Snapshot::read(&snapshot_path, &migrations)? {
            Some((seq, state)) => (seq, state),
            None => (0, MaterializedState::default()),
        };

        let mut wal = Wal::open(root.join(WAL_FILE_NAME), processed_seq)?;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply(&entry.event);
            wal.mark_processed(entry.seq);
        }

        Ok(Self { root, wal: parking_lot::Mutex::new(wal), state: Arc::new(RwLock::new(state)) })
    }

    /// Appends `event` to the WAL and applies it to the materialized state.
    /// Returns the assigned sequence number.
    pub fn append(&self, event: StorageEvent) -> Result<u64, StoreError> {
        let mut wal = self.wal.lock();
        let seq = wal.append(&event)?;
        if wal.needs_flush() {
            wal.flush()?;
        }
        self.state.write().apply(&event);
        wal.mark_processed(seq);
        Ok(seq)
    }

    /// A consistent point-in-time clone of the materialized state. Cheap
    /// relative to the I/O this crate otherwise does; callers that only need
    /// one field should still prefer this over holding the lock open.
    pub fn snapshot_state(&self) -> MaterializedState {
        self.state.read().clone()
    }

    /// Read access without cloning, for callers that need to inspect many
    /// fields in one pass.
    pub fn with_state<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        f(&self.state.read())
    }

    /// Compacts the WAL: writes a snapshot of the current state and
    /// truncates the WAL to entries after the snapshot's sequence number.
    /// Safe to call at any time; readers are unaffected.
    pub fn compact(&self) -> Result<(), StoreError> {
        let mut wal = self.wal.lock();
        wal.flush()?;
        let seq = wal.write_seq();
        let state = self.state.read().clone();
        Snapshot::write(self.root.join(SNAPSHOT_FILE_NAME), seq, &state)?;
        wal.truncate_before(seq + 1)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        Ok(self.wal.lock().flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::Analysis;
    use tempfile::tempdir;

    #[test]
    fn reopening_replays_wal_onto_empty_state() {
        let dir = tempdir().unwrap();
        let analysis = Analysis::new("demo", None);
        {
            let store = MetadataStore::open(dir.path()).unwrap();
            store.append(StorageEvent::AnalysisCreated { analysis: analysis.clone() }).unwrap();
        }
        let reopened = MetadataStore::open(dir.path()).unwrap();
        assert!(reopened.snapshot_state().get_analysis(&analysis.id).is_some());
    }

    #[test]
    fn compact_then_reopen_preserves_state() {
        let dir = tempdir().unwrap();
        let analysis = Analysis::new("demo", None);
        let store = MetadataStore::open(dir.path()).unwrap();
        store.append(StorageEvent::AnalysisCreated { analysis: analysis.clone() }).unwrap();
        store.compact().unwrap();
        drop(store);

        let reopened = MetadataStore::open(dir.path()).unwrap();
        assert!(reopened.snapshot_state().get_analysis(&analysis.id).is_some());
    }

    #[test]
    fn append_assigns_strictly_increasing_sequence() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        let a = Analysis::new("a", None);
        let b = Analysis::new("b", None);
        let seq1 = store.append(StorageEvent::AnalysisCreated { analysis: a }).unwrap();
        let seq2 = store.append(StorageEvent::AnalysisCreated { analysis: b }).unwrap();
        assert!(seq2 > seq1);
    }
}
