// SPDX-License-Identifier: MIT

//! Append-only write-ahead log. Every mutation to the metadata store is
//! first durably appended here before the in-memory [`crate::state::MaterializedState`]
//! is updated, so a crash between the two can always be recovered by replay.
//!
//! On-disk format is newline-delimited JSON: one `{"seq": u64, "event": ...}`
//! object per line. Corruption (a non-UTF-8 byte run, or a line that fails to
//! parse) truncates the log at the first bad line; the damaged tail is
//! rotated into up to three `.bak` generations rather than discarded.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Number of buffered appends before [`Wal::needs_flush`] reports true.
const FLUSH_THRESHOLD: usize = 100;
/// Time-based flush trigger, independent of the entry-count threshold.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
/// How many rotated backup generations are kept (`.bak`, `.bak.2`, `.bak.3`).
const MAX_BACKUPS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct WalEntry<E> {
    pub seq: u64,
    pub event: E,
}

#[derive(Serialize, Deserialize)]
struct WalLine<E> {
    seq: u64,
    event: E,
}

pub struct Wal<E> {
    path: PathBuf,
    writer: File,
    entries: Vec<WalEntry<E>>,
    cursor: usize,
    processed_seq: u64,
    unflushed: usize,
    last_flush: Instant,
}

impl<E> Wal<E>
where
    E: Serialize + DeserializeOwned + Clone,
{
    /// Opens (creating if absent) the log at `path`, recovering from any
    /// trailing corruption, and positions the unprocessed-entry cursor just
    /// past `processed_seq` (the sequence number a prior snapshot already
    /// accounts for).
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = fs::read(&path)?;
            let (entries, had_corruption) = Self::parse(&raw);
            if had_corruption {
                rotate_backups(&path)?;
                Self::rewrite_clean(&path, &entries)?;
            }
            entries
        } else {
            Vec::new()
        };

        let writer = OpenOptions::new().create(true).append(true).open(&path)?;
        let cursor = entries.iter().position(|e| e.seq > processed_seq).unwrap_or(entries.len());

        Ok(Self {
            path,
            writer,
            entries,
            cursor,
            processed_seq,
            unflushed: 0,
            last_flush: Instant::now(),
        })
    }

    /// Parses newline-delimited entries, stopping at the first invalid UTF-8
    /// run or line that fails to deserialize. Returns the valid prefix and
    /// whether anything past it had to be discarded.
    fn parse(raw: &[u8]) -> (Vec<WalEntry<E>>, bool) {
        let text = match std::str::from_utf8(raw) {
            Ok(t) => t,
            Err(e) => {
                let valid_prefix = &raw[..e.valid_up_to()];
                let text = std::str::from_utf8(valid_prefix).unwrap_or("");
                let (entries, _) = Self::parse_lines(text);
                return (entries, true);
            }
        };
        Self::parse_lines(text)
    }

    fn parse_lines(text: &str) -> (Vec<WalEntry<E>>, bool) {
        let mut entries = Vec::new();
        let mut corrupted = false;
        for line in BufReader::new(text.as_bytes()).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => {
                    corrupted = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalLine<E>>(&line) {
                Ok(parsed) => entries.push(WalEntry { seq: parsed.seq, event: parsed.event }),
                Err(_) => {
                    corrupted = true;
                    break;
                }
            }
        }
        (entries, corrupted)
    }

    fn rewrite_clean(path: &Path, entries: &[WalEntry<E>]) -> Result<(), WalError> {
        let mut file = File::create(path)?;
        for entry in entries {
            let line = serde_json::to_string(&WalLine { seq: entry.seq, event: entry.event.clone() })?;
            writeln!(file, "{line}")?;
        }
        file.flush()?;
        Ok(())
    }

    /// The sequence number of the most recently appended entry (0 if empty).
    pub fn write_seq(&self) -> u64 {
        self.entries.last().map(|e| e.seq).unwrap_or(0)
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn append(&mut self, event: &E) -> Result<u64, WalError> {
        let seq = self.write_seq() + 1;
        let line = serde_json::to_string(&WalLine { seq, event: event.clone() })?;
        writeln!(self.writer, "{line}")?;
        self.unflushed += 1;
        self.entries.push(WalEntry { seq, event: event.clone() });
        Ok(seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.sync_data()?;
        self.unflushed = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.unflushed >= FLUSH_THRESHOLD || (self.unflushed > 0 && self.last_flush.elapsed() >= FLUSH_INTERVAL)
    }

    /// Returns the next entry past the cursor without marking it processed.
    /// Repeated calls advance the cursor, so each entry is only returned once
    /// per `Wal` instance.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry<E>>, WalError> {
        if self.cursor >= self.entries.len() {
            return Ok(None);
        }
        let entry = self.entries[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(entry))
    }

    pub fn mark_processed(&mut self, seq: u64) {
        if seq > self.processed_seq {
            self.processed_seq = seq;
        }
    }

    pub fn entries_after(&self, since_seq: u64) -> Result<Vec<WalEntry<E>>, WalError> {
        Ok(self.entries.iter().filter(|e| e.seq > since_seq).cloned().collect())
    }

    /// Drops entries with `seq < keep_from` and rewrites the file, used
    /// after a snapshot has durably captured everything before `keep_from`.
    pub fn truncate_before(&mut self, keep_from: u64) -> Result<(), WalError> {
        self.entries.retain(|e| e.seq >= keep_from);
        self.cursor = self.cursor.min(self.entries.len());
        Self::rewrite_clean(&self.path, &self.entries)?;
        self.writer = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

fn rotate_backups(path: &Path) -> std::io::Result<()> {
    // Generations are named path.bak, path.bak.2, path.bak.3 — the fixed
    // extension replaces whatever extension `path` had.
    let bak = |n: u32| -> PathBuf {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    debug_assert_eq!(MAX_BACKUPS, 3, "rotation below is hardcoded to three generations");
    let b1 = bak(1);
    let b2 = bak(2);
    let b3 = bak(3);

    let _ = fs::remove_file(&b3);
    if b2.exists() {
        fs::rename(&b2, &b3)?;
    }
    if b1.exists() {
        fs::rename(&b1, &b2)?;
    }
    fs::rename(path, &b1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    enum TestEvent {
        Tick { label: String },
        Shutdown,
    }

    fn tick(label: &str) -> TestEvent {
        TestEvent::Tick { label: label.to_string() }
    }

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        assert!(path.exists());
        assert_eq!(wal.write_seq(), 0);
        assert_eq!(wal.processed_seq(), 0);
    }

    #[test]
    fn append_and_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.append(&tick("a")).unwrap(), 1);
        assert_eq!(wal.append(&tick("b")).unwrap(), 2);
        wal.flush().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn next_unprocessed_then_exhausted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        wal.append(&tick("a")).unwrap();
        wal.append(&tick("b")).unwrap();

        let e1 = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(e1.seq, 1);
        let e2 = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(e2.seq, 2);
        assert!(wal.next_unprocessed().unwrap().is_none());
    }

    #[test]
    fn mark_processed_advances_seq() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        wal.append(&tick("a")).unwrap();
        wal.flush().unwrap();
        let e = wal.next_unprocessed().unwrap().unwrap();
        wal.mark_processed(e.seq);
        assert_eq!(wal.processed_seq(), 1);
    }

    #[test]
    fn reopen_with_processed_seq_skips_prior_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
            wal.append(&tick("a")).unwrap();
            wal.append(&tick("b")).unwrap();
            wal.append(&tick("c")).unwrap();
            wal.flush().unwrap();
        }
        let mut wal: Wal<TestEvent> = Wal::open(&path, 2).unwrap();
        let e = wal.next_unprocessed().unwrap().unwrap();
        assert_eq!(e.seq, 3);
        assert!(wal.next_unprocessed().unwrap().is_none());
    }

    #[test]
    fn entries_after_returns_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        wal.append(&tick("a")).unwrap();
        wal.append(&tick("b")).unwrap();
        wal.append(&tick("c")).unwrap();
        wal.flush().unwrap();
        let entries = wal.entries_after(1).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 2);
        assert_eq!(entries[1].seq, 3);
    }

    #[test]
    fn truncate_before_drops_older_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        wal.append(&tick("a")).unwrap();
        wal.append(&tick("b")).unwrap();
        wal.append(&tick("c")).unwrap();
        wal.flush().unwrap();
        wal.truncate_before(2).unwrap();
        let entries = wal.entries_after(0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 2);
    }

    #[test]
    fn shutdown_event_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
            wal.append(&tick("a")).unwrap();
            wal.append(&TestEvent::Shutdown).unwrap();
            wal.flush().unwrap();
        }
        let mut wal: Wal<TestEvent> = Wal::open(&path, 1).unwrap();
        let entries = wal.entries_after(1).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].event, TestEvent::Shutdown));
        let entry = wal.next_unprocessed().unwrap().unwrap();
        assert!(matches!(entry.event, TestEvent::Shutdown));
        assert!(wal.next_unprocessed().unwrap().is_none());
    }

    #[test]
    fn needs_flush_after_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        assert!(!wal.needs_flush());
        for i in 0..101 {
            wal.append(&tick(&format!("e{i}"))).unwrap();
        }
        assert!(wal.needs_flush());
    }

    #[test]
    fn corrupt_tail_is_rotated_and_valid_entries_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        {
            let mut wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
            wal.append(&tick("a")).unwrap();
            wal.append(&tick("b")).unwrap();
            wal.flush().unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"not-valid-json\n").unwrap();
        }
        let wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 2);
        assert!(path.with_extension("bak").exists());
        let entries = wal.entries_after(0).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn corrupt_opens_rotate_at_most_three_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        for i in 1..=4u8 {
            fs::write(&path, [i; 8]).unwrap();
            let wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
            assert_eq!(wal.write_seq(), 0);
        }
        assert_eq!(fs::read(path.with_extension("bak")).unwrap(), vec![4u8; 8]);
        assert_eq!(fs::read(path.with_extension("bak.2")).unwrap(), vec![3u8; 8]);
        assert_eq!(fs::read(path.with_extension("bak.3")).unwrap(), vec![2u8; 8]);
        assert!(!path.with_extension("bak.4").exists());
    }

    #[test]
    fn binary_garbage_is_treated_as_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        fs::write(&path, [0x80, 0x81, 0x82, 0xff, 0xfe, b'\n']).unwrap();
        let wal: Wal<TestEvent> = Wal::open(&path, 0).unwrap();
        assert_eq!(wal.write_seq(), 0);
        assert!(path.with_extension("bak").exists());
    }
}
