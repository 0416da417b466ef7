// SPDX-License-Identifier: MIT

//! Loads `orchestrator.toml` and fills in the fixed state-directory layout
//! beneath it, the same `Config::load()` shape used elsewhere but sourced
//! from a real config file on disk instead of hardcoded XDG paths alone.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("could not determine a state directory; set ORCHESTRATOR_STATE_DIR or state_dir in orchestrator.toml")]
    NoStateDir,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    state_dir: Option<PathBuf>,
    bind_addr: Option<String>,
    auth: RawAuthConfig,
    log_shipping: RawLogShippingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthConfig {
    tokens: Vec<StaticToken>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLogShippingConfig {
    endpoint: Option<String>,
    batch_size: Option<usize>,
    flush_interval_ms: Option<u64>,
}

/// "production" hides internal error detail; anything else (the default,
/// `"development"`) is free to be verbose. Read at startup, not per-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogShippingConfig {
    pub endpoint: Option<String>,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for LogShippingConfig {
    fn default() -> Self {
        Self { endpoint: None, batch_size: 256, flush_interval_ms: 5_000 }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub bind_addr: String,
    pub state_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub analysis_root: PathBuf,
    pub config_root: PathBuf,
    pub dns_socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub daemon_log_path: PathBuf,
    pub auth_tokens: Vec<StaticToken>,
    pub log_shipping: LogShippingConfig,
}

impl Config {
    /// Loads `path` if it exists (silently falling back to defaults if it
    /// doesn't — a fresh install has no `orchestrator.toml` yet), then
    /// resolves every path under the discovered state directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str::<RawConfig>(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RawConfig::default(),
            Err(e) => return Err(ConfigError::Read(path.to_path_buf(), e)),
        };

        let state_dir = raw
            .state_dir
            .or_else(|| std::env::var_os("ORCHESTRATOR_STATE_DIR").map(PathBuf::from))
            .or_else(|| dirs::state_dir().map(|d| d.join("orchestrator")))
            .or_else(|| dirs::data_local_dir().map(|d| d.join("orchestrator")))
            .ok_or(ConfigError::NoStateDir)?;

        let log_shipping = LogShippingConfig {
            endpoint: raw.log_shipping.endpoint,
            batch_size: raw.log_shipping.batch_size.unwrap_or(256),
            flush_interval_ms: raw.log_shipping.flush_interval_ms.unwrap_or(5_000),
        };

        Ok(Self {
            app_env: AppEnv::from_env(),
            bind_addr: raw.bind_addr.unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            metadata_dir: state_dir.join("metadata"),
            analysis_root: state_dir.join("analyses"),
            config_root: state_dir.join("config"),
            dns_socket_path: state_dir.join("dns.sock"),
            lock_path: state_dir.join("orchestrator.pid"),
            daemon_log_path: state_dir.join("orchestrator.log"),
            auth_tokens: raw.auth.tokens,
            log_shipping,
            state_dir,
        })
    }

    pub fn hide_internal_error_detail(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_env_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("ORCHESTRATOR_STATE_DIR", dir.path());
        let config = Config::load(&dir.path().join("does-not-exist.toml")).unwrap();
        assert_eq!(config.state_dir, dir.path());
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        std::env::remove_var("ORCHESTRATOR_STATE_DIR");
    }

    #[test]
    fn parses_auth_tokens_and_log_shipping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(
            &path,
            format!(
                "state_dir = \"{}\"\nbind_addr = \"0.0.0.0:9090\"\n\n[[auth.tokens]]\ntoken = \"dev-admin\"\nuser_id = \"u-1\"\nis_admin = true\n\n[log_shipping]\nendpoint = \"https://collector.example/ingest\"\nbatch_size = 64\n",
                dir.path().display()
            ),
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.auth_tokens.len(), 1);
        assert_eq!(config.auth_tokens[0].token, "dev-admin");
        assert!(config.auth_tokens[0].is_admin);
        assert_eq!(config.log_shipping.endpoint.as_deref(), Some("https://collector.example/ingest"));
        assert_eq!(config.log_shipping.batch_size, 64);
    }
}
