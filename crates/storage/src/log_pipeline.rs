// SPDX-License-Identifier: MIT

//! The on-disk half of the child-log pipeline. The
//! in-memory ring ([`ao_core::LogBuffer`]) is owned by the supervisor crate;
//! this module only knows how to reload it from, and append it to, the
//! append-only NDJSON file at `<analysisRoot>/<id>/analysis.log`.

use crate::safe_path;
use ao_core::{ErrorKind, HasErrorKind, LogBuffer, LogEntry, LogLevel};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Above this file size, `initialize_log_state` discards the file rather
/// than replaying it.
pub const MAX_LOG_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
const LOG_FILE_NAME: &str = "analysis.log";

#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    #[error("path escapes the analysis root")]
    UnsafePath,
    #[error("log io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasErrorKind for LogPipelineError {
    fn kind(&self) -> ErrorKind {
        match self {
            LogPipelineError::UnsafePath => ErrorKind::PathTraversal,
            LogPipelineError::Io(_) => ErrorKind::Internal,
        }
    }
}

fn log_path(analysis_root: &Path, analysis_id: &str) -> Result<std::path::PathBuf, LogPipelineError> {
    safe_path::analysis_file_path(analysis_root, analysis_id, &[LOG_FILE_NAME]).ok_or(LogPipelineError::UnsafePath)
}

/// Reloads the in-memory ring for an analysis on first access after process
/// startup. A missing file is not an error — it just yields an empty buffer
/// with `total_log_count() == 0`.
pub fn initialize_log_state(
    analysis_root: &Path,
    analysis_id: &str,
    max_memory_logs: usize,
) -> Result<LogBuffer, LogPipelineError> {
    let path = log_path(analysis_root, analysis_id)?;

    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LogBuffer::new(max_memory_logs)),
        Err(e) => return Err(e.into()),
    };

    if metadata.len() > MAX_LOG_FILE_SIZE_BYTES {
        std::fs::remove_file(&path)?;
        let mut buffer = LogBuffer::new(max_memory_logs);
        buffer.reset_with(LogEntry {
            sequence: 1,
            timestamp: 0,
            level: LogLevel::Warn,
            message: "logs cleared due to size".to_string(),
        });
        return Ok(buffer);
    }

    let file = std::fs::File::open(&path)?;
    let reader = BufReader::new(file);
    let mut buffer = LogBuffer::new(max_memory_logs);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => buffer.push(entry),
            Err(_) => continue, // a single malformed line must not poison the whole reload
        }
    }
    Ok(buffer)
}

/// Appends one NDJSON line. Callers are responsible for also pushing the
/// same entry into the in-memory [`LogBuffer`].
pub fn append_log(analysis_root: &Path, analysis_id: &str, entry: &LogEntry) -> Result<(), LogPipelineError> {
    let path = log_path(analysis_root, analysis_id)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    let line = serde_json::to_string(entry).map_err(|e| LogPipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Truncates the log file and returns a fresh in-memory buffer seeded with
/// `clear_message` if one was given, matching the `logsCleared` event's
/// optional `clearMessage` field.
pub fn clear_logs(
    analysis_root: &Path,
    analysis_id: &str,
    max_memory_logs: usize,
    clear_message: Option<&str>,
) -> Result<LogBuffer, LogPipelineError> {
    let path = log_path(analysis_root, analysis_id)?;
    let _ = std::fs::remove_file(&path); // absence is fine, we're clearing either way

    let mut buffer = LogBuffer::new(max_memory_logs);
    if let Some(message) = clear_message {
        buffer.reset_with(LogEntry {
            sequence: 1,
            timestamp: 0,
            level: LogLevel::Info,
            message: message.to_string(),
        });
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(seq: u64, msg: &str) -> LogEntry {
        LogEntry { sequence: seq, timestamp: seq, level: LogLevel::Info, message: msg.to_string() }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let buffer = initialize_log_state(dir.path(), "an-1", 100).unwrap();
        assert_eq!(buffer.total_log_count(), 0);
    }

    #[test]
    fn append_then_initialize_reloads_entries() {
        let dir = tempdir().unwrap();
        append_log(dir.path(), "an-1", &entry(1, "hello")).unwrap();
        append_log(dir.path(), "an-1", &entry(2, "world")).unwrap();

        let buffer = initialize_log_state(dir.path(), "an-1", 100).unwrap();
        assert_eq!(buffer.total_log_count(), 2);
    }

    #[test]
    fn oversized_file_is_replaced_with_synthetic_entry() {
        let dir = tempdir().unwrap();
        let path = log_path(dir.path(), "an-1").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        // Simulate an oversized file without writing 50MiB of real data.
        {
            let file = std::fs::File::create(&path).unwrap();
            file.set_len(MAX_LOG_FILE_SIZE_BYTES + 1).unwrap();
        }

        let buffer = initialize_log_state(dir.path(), "an-1", 100).unwrap();
        assert_eq!(buffer.total_log_count(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn clear_logs_truncates_file_and_seeds_message() {
        let dir = tempdir().unwrap();
        append_log(dir.path(), "an-1", &entry(1, "hello")).unwrap();

        let buffer = clear_logs(dir.path(), "an-1", 100, Some("logs cleared by operator")).unwrap();
        assert_eq!(buffer.total_log_count(), 1);
        assert!(!log_path(dir.path(), "an-1").unwrap().exists());
    }

    #[test]
    fn clear_logs_without_message_yields_empty_buffer() {
        let dir = tempdir().unwrap();
        append_log(dir.path(), "an-1", &entry(1, "hello")).unwrap();
        let buffer = clear_logs(dir.path(), "an-1", 100, None).unwrap();
        assert_eq!(buffer.total_log_count(), 0);
    }
}
