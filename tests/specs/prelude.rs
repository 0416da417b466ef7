// SPDX-License-Identifier: MIT

//! Shared fixtures for the workspace-level specs: a fully wired store +
//! supervisor + fan-out + permission resolver + rate limiter, the same way
//! `ao-daemon::lifecycle::Daemon::startup` wires them in production, minus
//! the HTTP layer and DNS IPC socket (those are exercised within `ao-http`
//! and `ao-dns` respectively).

#![allow(dead_code)]

use ao_access::{PermissionResolver, RateLimiter};
use ao_core::{Analysis, AnalysisId, FakeClock};
use ao_fanout::FanoutHub;
use ao_storage::event::StorageEvent;
use ao_storage::MetadataStore;
use ao_supervisor::launcher::ShellLauncher;
use ao_supervisor::AnalysisSupervisor;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub _root: TempDir,
    pub analysis_root: std::path::PathBuf,
    pub clock: FakeClock,
    pub store: Arc<MetadataStore>,
    pub fanout: Arc<FanoutHub>,
    pub supervisor: Arc<AnalysisSupervisor<FakeClock>>,
    pub permissions: PermissionResolver,
    pub rate_limiter: RateLimiter<FakeClock>,
}

impl Harness {
    pub fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let analysis_root = root.path().join("analyses");
        std::fs::create_dir_all(&analysis_root).expect("create analysis root");

        let clock = FakeClock::new();
        let store = Arc::new(MetadataStore::open(root.path().join("meta")).expect("open store"));
        let fanout = Arc::new(FanoutHub::new());
        let supervisor = Arc::new(AnalysisSupervisor::new(
            clock.clone(),
            analysis_root.clone(),
            root.path().join("dns.sock"),
            Arc::clone(&fanout),
            Arc::clone(&store),
            Arc::new(ShellLauncher),
        ));
        let permissions = PermissionResolver::new(Arc::clone(&store));
        let rate_limiter = RateLimiter::new(clock.clone());

        Self { _root: root, analysis_root, clock, store, fanout, supervisor, permissions, rate_limiter }
    }

    /// Registers a new analysis with a shell-script entry point and returns
    /// its id. `team_id: None` lands it in the reserved uncategorized team.
    pub fn register_analysis(&self, script: &str, team_id: Option<ao_core::TeamId>) -> AnalysisId {
        let analysis = Analysis::new("spec-analysis", team_id.map(|t| t.as_str().to_string()));
        let id = analysis.id;
        self.store.append(StorageEvent::AnalysisCreated { analysis }).expect("append analysis");

        let dir = self.analysis_root.join(id.as_str());
        std::fs::create_dir_all(&dir).expect("create analysis dir");
        std::fs::write(dir.join("index.sh"), script).expect("write entry script");
        id
    }
}
