// SPDX-License-Identifier: MIT

//! Two small file formats the rest of the workspace persists through this
//! crate: per-analysis `.env` files and the DNS resolver's
//! `dns-cache-config.json`. Both go through [`crate::safe_path`] and both
//! write via a temp file + rename so a crash mid-write can't corrupt the
//! live file.

use crate::safe_path;
use ao_core::{ErrorKind, HasErrorKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    #[error("path escapes the analysis root")]
    UnsafePath,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HasErrorKind for ConfigStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            ConfigStoreError::UnsafePath => ErrorKind::PathTraversal,
            ConfigStoreError::Io(_) | ConfigStoreError::Json(_) => ErrorKind::Internal,
        }
    }
}

/// One line of a parsed `.env` file: either a `KEY=value` pair or a
/// passthrough comment/blank line, tracked in original order so a rewrite
/// reproduces comments verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvLine {
    Pair(String, String),
    Verbatim(String),
}

/// An environment file: ordered pairs plus whatever comment lines were
/// present, so `write` round-trips them.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    lines: Vec<EnvLine>,
}

impl EnvFile {
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        for raw_line in text.lines() {
            let trimmed = raw_line.trim_end();
            if trimmed.trim_start().starts_with('#') || trimmed.trim().is_empty() {
                lines.push(EnvLine::Verbatim(trimmed.to_string()));
                continue;
            }
            match trimmed.split_once('=') {
                Some((key, value)) => lines.push(EnvLine::Pair(key.trim().to_string(), value.to_string())),
                None => lines.push(EnvLine::Verbatim(trimmed.to_string())),
            }
        }
        Self { lines }
    }

    pub fn as_map(&self) -> BTreeMap<String, String> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                EnvLine::Pair(k, v) => Some((k.clone(), v.clone())),
                EnvLine::Verbatim(_) => None,
            })
            .collect()
    }

    /// Sets `key=value`, uppercasing the key. Updates the existing line in
    /// place if present, otherwise appends.
    pub fn set(&mut self, key: &str, value: &str) {
        let key = key.to_uppercase();
        for line in &mut self.lines {
            if let EnvLine::Pair(k, v) = line {
                if *k == key {
                    *v = value.to_string();
                    return;
                }
            }
        }
        self.lines.push(EnvLine::Pair(key, value.to_string()));
    }

    pub fn remove(&mut self, key: &str) {
        let key = key.to_uppercase();
        self.lines.retain(|l| !matches!(l, EnvLine::Pair(k, _) if *k == key));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                EnvLine::Pair(k, v) => out.push_str(&format!("{k}={v}\n")),
                EnvLine::Verbatim(l) => {
                    out.push_str(l);
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// Reads `<analysis_root>/<id>/.env`, returning an empty file if absent.
pub fn read_env(analysis_root: &Path, analysis_id: &str) -> Result<EnvFile, ConfigStoreError> {
    let path = safe_path::analysis_file_path(analysis_root, analysis_id, &[".env"]).ok_or(ConfigStoreError::UnsafePath)?;
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(EnvFile::parse(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EnvFile::default()),
        Err(e) => Err(e.into()),
    }
}

/// Writes `<analysis_root>/<id>/.env` atomically (write to `.tmp`, rename).
pub fn write_env(analysis_root: &Path, analysis_id: &str, env: &EnvFile) -> Result<(), ConfigStoreError> {
    let path = safe_path::analysis_file_path(analysis_root, analysis_id, &[".env"]).ok_or(ConfigStoreError::UnsafePath)?;
    atomic_write(&path, env.render().as_bytes())
}

/// Writes `dns-cache-config.json` atomically. Callers serialize
/// `ao_core::DnsConfig` themselves; this module only owns the I/O.
pub fn write_json_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigStoreError> {
    atomic_write(path, bytes)
}

pub fn read_json(path: &Path) -> Result<Option<Vec<u8>>, ConfigStoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), ConfigStoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp: PathBuf = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
