// SPDX-License-Identifier: MIT

//! Source upload/edit/version history. Every upload or edit snapshots the
//! previous entry file into `versions/<version>/<fileName>` before writing
//! the new content, so `rollback` can restore it byte-for-byte.

use crate::safe_path;
use ao_core::ErrorKind;
use ao_core::HasErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SourceStoreError {
    #[error("path escapes the analysis root")]
    UnsafePath,
    #[error("no entry file for analysis")]
    NoEntryFile,
    #[error("version {0} not found")]
    VersionNotFound(u32),
    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasErrorKind for SourceStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            SourceStoreError::UnsafePath => ErrorKind::PathTraversal,
            SourceStoreError::NoEntryFile | SourceStoreError::VersionNotFound(_) => ErrorKind::NotFound,
            SourceStoreError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Finds the current entry file (`index.<ext>`), returning its path and
/// file name. The directory is expected to hold exactly one such file.
fn find_entry(analysis_root: &Path, analysis_id: &str) -> Result<(PathBuf, String), SourceStoreError> {
    let dir = safe_path::analysis_file_path(analysis_root, analysis_id, &[]).ok_or(SourceStoreError::UnsafePath)?;
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file() && p.file_stem().and_then(|s| s.to_str()) == Some("index")).collect())
        .unwrap_or_default();
    candidates.sort();
    let path = candidates.into_iter().next().ok_or(SourceStoreError::NoEntryFile)?;
    let name = path.file_name().and_then(|n| n.to_str()).ok_or(SourceStoreError::NoEntryFile)?.to_string();
    Ok((path, name))
}

/// Reads the current entry file's content and file name.
pub fn read_content(analysis_root: &Path, analysis_id: &str) -> Result<(String, String), SourceStoreError> {
    let (path, name) = find_entry(analysis_root, analysis_id)?;
    Ok((std::fs::read_to_string(path)?, name))
}

/// Writes `content` as a new entry file (first upload, no prior version to
/// snapshot). `file_name` must already have passed
/// [`safe_path::is_safe_filename`]. Returns the assigned version (always 1).
pub fn write_initial(analysis_root: &Path, analysis_id: &str, file_name: &str, content: &str) -> Result<u32, SourceStoreError> {
    if !safe_path::is_safe_filename(file_name) {
        return Err(SourceStoreError::UnsafePath);
    }
    let path = safe_path::analysis_file_path(analysis_root, analysis_id, &[file_name]).ok_or(SourceStoreError::UnsafePath)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, content)?;
    Ok(1)
}

/// Snapshots the current entry file into `versions/<current_version>/<name>`,
/// then overwrites the entry file with `content`. Returns the new version
/// number (`current_version + 1`).
pub fn write_update(analysis_root: &Path, analysis_id: &str, current_version: u32, content: &str) -> Result<u32, SourceStoreError> {
    let (path, name) = find_entry(analysis_root, analysis_id)?;
    let version_dir = safe_path::analysis_file_path(analysis_root, analysis_id, &["versions", &current_version.to_string()]).ok_or(SourceStoreError::UnsafePath)?;
    std::fs::create_dir_all(&version_dir)?;
    std::fs::copy(&path, version_dir.join(&name))?;
    std::fs::write(&path, content)?;
    Ok(current_version + 1)
}

/// Reads a historical version's content without mutating the live entry.
pub fn read_version(analysis_root: &Path, analysis_id: &str, version: u32) -> Result<(String, String), SourceStoreError> {
    let (_, name) = find_entry(analysis_root, analysis_id)?;
    let path = safe_path::analysis_file_path(analysis_root, analysis_id, &["versions", &version.to_string(), &name]).ok_or(SourceStoreError::UnsafePath)?;
    let content = std::fs::read_to_string(&path).map_err(|e| if e.kind() == std::io::ErrorKind::NotFound { SourceStoreError::VersionNotFound(version) } else { e.into() })?;
    Ok((content, name))
}

/// Restores `version` as the live entry file content. The target version
/// itself is left untouched in `versions/` so repeated rollbacks are
/// idempotent.
pub fn rollback(analysis_root: &Path, analysis_id: &str, version: u32) -> Result<(), SourceStoreError> {
    let (content, name) = read_version(analysis_root, analysis_id, version)?;
    let path = safe_path::analysis_file_path(analysis_root, analysis_id, &[&name]).ok_or(SourceStoreError::UnsafePath)?;
    std::fs::write(&path, content)?;
    Ok(())
}
