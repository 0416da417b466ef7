// SPDX-License-Identifier: MIT

//! Daemon startup and shutdown, following a lock-file-first,
//! snapshot-then-replay bootstrap shape: acquire the exclusive lock before
//! touching anything else, open the metadata store (which itself replays
//! its WAL onto the last snapshot), bind the DNS IPC socket last so a
//! failure earlier in startup never leaves a half-bound listener behind.

use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use ao_access::RateLimiter;
use ao_core::SystemClock;
use ao_dns::{DnsService, SsrfPolicy};
use ao_fanout::FanoutHub;
use ao_http::AppState;
use ao_storage::MetadataStore;
use ao_supervisor::{AnalysisSupervisor, DefaultLauncher};
use fs2::FileExt;
use tracing::info;

use crate::auth::ConfigTokenOracle;
use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("another instance is already running (lock held on {0})")]
    LockHeld(std::path::PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata store error: {0}")]
    Store(#[from] ao_storage::StoreError),
    #[error("dns config error: {0}")]
    DnsConfig(#[from] ao_storage::config_store::ConfigStoreError),
    #[error("dns resolver init error: {0}")]
    DnsResolver(#[from] hickory_resolver::error::ResolveError),
}

pub struct Daemon {
    pub config: Config,
    pub store: Arc<MetadataStore>,
    pub dns: Arc<DnsService<SystemClock>>,
    pub supervisor: Arc<AnalysisSupervisor<SystemClock>>,
    pub fanout: Arc<FanoutHub>,
    _lock_file: File,
}

impl Daemon {
    pub async fn startup(config: Config) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.state_dir)?;
        std::fs::create_dir_all(&config.analysis_root)?;
        std::fs::create_dir_all(&config.config_root)?;

        let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| LifecycleError::LockHeld(config.lock_path.clone()))?;
        let mut lock_file = lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;

        let clock = SystemClock;
        let store = Arc::new(MetadataStore::open(&config.metadata_dir)?);
        info!(path = %config.metadata_dir.display(), "metadata store opened");

        let dns_config_path = config.config_root.join("dns-cache-config.json");
        let dns_config = ao_dns::config::load(&dns_config_path)?;
        let dns = Arc::new(DnsService::new(clock, dns_config, SsrfPolicy::default())?);

        let fanout = Arc::new(FanoutHub::new());
        let launcher = Arc::new(DefaultLauncher);
        let supervisor = Arc::new(AnalysisSupervisor::new(
            clock,
            config.analysis_root.clone(),
            config.dns_socket_path.clone(),
            Arc::clone(&fanout),
            Arc::clone(&store),
            launcher,
        ));

        let dns_for_server = Arc::clone(&dns);
        let dns_socket_path = config.dns_socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = ao_dns::server::serve(&dns_socket_path, dns_for_server).await {
                tracing::error!(error = %e, "dns ipc server exited");
            }
        });

        let failures = supervisor.reconcile_startup().await;
        for (id, error) in &failures {
            tracing::warn!(analysis_id = %id.as_str(), error = %error, "failed to reconcile analysis at startup");
        }
        info!(reconciled_failures = failures.len(), "startup reconciliation complete");

        Ok(Self { config, store, dns, supervisor, fanout, _lock_file: lock_file })
    }

    pub fn build_router(&self) -> axum::Router {
        let clock = SystemClock;
        let rate_limiter = Arc::new(RateLimiter::new(clock));
        let sessions = Arc::new(ConfigTokenOracle::new(&self.config.auth_tokens));
        let state = AppState::new(
            clock,
            Arc::clone(&self.store),
            Arc::clone(&self.supervisor),
            Arc::clone(&self.dns),
            Arc::clone(&self.fanout),
            rate_limiter,
            sessions,
            self.config.analysis_root.clone(),
            self.config.config_root.clone(),
        );
        ao_http::build_router(state)
    }

    /// Flushes the WAL and releases the lock file. The lock itself is also
    /// released on drop, but calling this explicitly lets shutdown log
    /// before the process exits.
    pub fn shutdown(&self) {
        if let Err(e) = self.store.flush() {
            tracing::warn!(error = %e, "failed to flush metadata store on shutdown");
        }
        if let Err(e) = self.store.compact() {
            tracing::warn!(error = %e, "failed to compact metadata store on shutdown");
        }
        info!("orchestrator shut down cleanly");
    }
}
