// SPDX-License-Identifier: MIT

//! The one [`AppState`] every handler in [`crate::routes`] receives through
//! axum's `State` extractor. Construction happens once in the daemon's
//! `main`; this crate never opens a [`MetadataStore`] or spawns a
//! [`DnsService`] itself.

use ao_access::{PermissionResolver, RateLimiter};
use ao_core::Clock;
use ao_dns::DnsService;
use ao_fanout::FanoutHub;
use ao_storage::MetadataStore;
use ao_supervisor::AnalysisSupervisor;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::SessionOracle;

pub struct AppState<C: Clock> {
    pub clock: C,
    pub store: Arc<MetadataStore>,
    pub supervisor: Arc<AnalysisSupervisor<C>>,
    pub dns: Arc<DnsService<C>>,
    pub fanout: Arc<FanoutHub>,
    pub permissions: PermissionResolver,
    pub rate_limiter: Arc<RateLimiter<C>>,
    pub sessions: Arc<dyn SessionOracle>,
    pub analysis_root: PathBuf,
    /// Directory holding `dns-cache-config.json`, distinct from
    /// `analysis_root` which is per-analysis.
    pub config_root: PathBuf,
}

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            store: Arc::clone(&self.store),
            supervisor: Arc::clone(&self.supervisor),
            dns: Arc::clone(&self.dns),
            fanout: Arc::clone(&self.fanout),
            permissions: self.permissions.clone(),
            rate_limiter: Arc::clone(&self.rate_limiter),
            sessions: Arc::clone(&self.sessions),
            analysis_root: self.analysis_root.clone(),
            config_root: self.config_root.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
impl<C: Clock> AppState<C> {
    pub fn new(
        clock: C,
        store: Arc<MetadataStore>,
        supervisor: Arc<AnalysisSupervisor<C>>,
        dns: Arc<DnsService<C>>,
        fanout: Arc<FanoutHub>,
        rate_limiter: Arc<RateLimiter<C>>,
        sessions: Arc<dyn SessionOracle>,
        analysis_root: impl Into<PathBuf>,
        config_root: impl Into<PathBuf>,
    ) -> Self {
        let permissions = PermissionResolver::new(Arc::clone(&store));
        Self {
            clock,
            store,
            supervisor,
            dns,
            fanout,
            permissions,
            rate_limiter,
            sessions,
            analysis_root: analysis_root.into(),
            config_root: config_root.into(),
        }
    }
}
