// SPDX-License-Identifier: MIT

//! The Analysis Supervisor's state machine: one child process
//! per analysis, started/stopped/cleaned up under a per-analysis critical
//! section, with output handling, exit classification, and restart
//! scheduling wired to [`crate::backoff`] and [`crate::output`].

use crate::backoff::{classify_exit, BackoffPolicy};
use crate::error::SupervisorError;
use crate::launcher::{ChildLauncher, SpawnContext};
use crate::output;
use ao_core::{AnalysisId, AnalysisStatus, Clock, IntendedState, LogBuffer, LogEntry, LogLevel, DEFAULT_MAX_MEMORY_LOGS};
use ao_fanout::FanoutHub;
use ao_storage::event::StorageEvent;
use ao_storage::MetadataStore;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;

/// Per-analysis mutable state, guarded by its own `tokio::sync::Mutex` so
/// that analyses never block each other — across analyses, the
/// Supervisor operates in parallel.
struct AnalysisRuntime {
    log_buffer: LogBuffer,
    log_initialized: bool,
    sequence: u64,
    child: Option<ChildState>,
    restart_attempts: u32,
    restart_timer: Option<JoinHandle<()>>,
    /// Mirrors the store's `intendedState` for this analysis so the monitor
    /// task can classify an exit without round-tripping through the store.
    intended_stopped: bool,
    connection_error_detected: bool,
}

#[derive(Clone)]
struct ChildState {
    pid: u32,
    /// Flips to `true` exactly once, after the monitor task has finished
    /// classifying the exit and (if applicable) scheduled a restart. A
    /// `watch` channel (not `Notify`) because `stop()` must be able to
    /// observe "already exited" even if it starts watching after the fact.
    exited: watch::Receiver<bool>,
}

impl AnalysisRuntime {
    fn new(max_memory_logs: usize) -> Self {
        Self {
            log_buffer: LogBuffer::new(max_memory_logs),
            log_initialized: false,
            sequence: 0,
            child: None,
            restart_attempts: 0,
            restart_timer: None,
            intended_stopped: true,
            connection_error_detected: false,
        }
    }
}

/// Owns every running analysis's child process. Constructed once per daemon
/// and shared behind an `Arc` so restart timers and HTTP handlers can both
/// call back into it.
pub struct AnalysisSupervisor<C: Clock> {
    clock: C,
    analysis_root: PathBuf,
    dns_socket_path: PathBuf,
    fanout: Arc<FanoutHub>,
    store: Arc<MetadataStore>,
    launcher: Arc<dyn ChildLauncher>,
    max_memory_logs: usize,
    backoff: BackoffPolicy,
    force_kill_timeout: Duration,
    runtimes: RwLock<HashMap<AnalysisId, Arc<TokioMutex<AnalysisRuntime>>>>,
}

impl<C: Clock> AnalysisSupervisor<C> {
    pub fn new(
        clock: C,
        analysis_root: impl Into<PathBuf>,
        dns_socket_path: impl Into<PathBuf>,
        fanout: Arc<FanoutHub>,
        store: Arc<MetadataStore>,
        launcher: Arc<dyn ChildLauncher>,
    ) -> Self {
        Self {
            clock,
            analysis_root: analysis_root.into(),
            dns_socket_path: dns_socket_path.into(),
            fanout,
            store,
            launcher,
            max_memory_logs: DEFAULT_MAX_MEMORY_LOGS,
            backoff: BackoffPolicy::default(),
            force_kill_timeout: Duration::from_millis(crate::backoff::DEFAULT_FORCE_KILL_TIMEOUT_MS),
            runtimes: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_memory_logs(mut self, max: usize) -> Self {
        self.max_memory_logs = max;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_force_kill_timeout(mut self, timeout: Duration) -> Self {
        self.force_kill_timeout = timeout;
        self
    }

    fn runtime_cell(&self, id: &AnalysisId) -> Arc<TokioMutex<AnalysisRuntime>> {
        if let Some(cell) = self.runtimes.read().get(id) {
            return Arc::clone(cell);
        }
        let mut map = self.runtimes.write();
        Arc::clone(map.entry(*id).or_insert_with(|| Arc::new(TokioMutex::new(AnalysisRuntime::new(self.max_memory_logs)))))
    }

    fn ensure_log_initialized(&self, id: &AnalysisId, runtime: &mut AnalysisRuntime) -> Result<(), SupervisorError> {
        if runtime.log_initialized {
            return Ok(());
        }
        let buffer = ao_storage::log_pipeline::initialize_log_state(&self.analysis_root, id.as_str(), self.max_memory_logs)?;
        runtime.sequence = buffer.total_log_count();
        runtime.log_buffer = buffer;
        runtime.log_initialized = true;
        Ok(())
    }

    fn publish_status(&self, id: &AnalysisId, status: AnalysisStatus, pid: Option<u32>) {
        self.fanout.broadcast_analysis_update(ao_core::LiveEvent::AnalysisStatus {
            analysis_id: *id,
            status: serde_json::json!({ "status": status, "pid": pid }),
        });
    }

    /// Starts the analysis's child process.
    ///
    /// Fails fast with [`SupervisorError::AlreadyStarting`] if a start is
    /// already in flight or a child is already running, rather than queuing
    /// behind it — the `isStarting` latch is implemented as a
    /// non-blocking `try_lock` for exactly this reason.
    pub async fn start(self: &Arc<Self>, id: &AnalysisId) -> Result<(), SupervisorError> {
        if self.store.with_state(|s| s.get_analysis(id).is_none()) {
            return Err(SupervisorError::NotFound(*id));
        }

        let cell = self.runtime_cell(id);
        let mut guard = match cell.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(SupervisorError::AlreadyStarting(*id)),
        };
        self.ensure_log_initialized(id, &mut guard)?;
        if guard.child.is_some() {
            return Err(SupervisorError::AlreadyStarting(*id));
        }

        let entry_path = find_entry_path(&self.analysis_root, id.as_str())
            .ok_or_else(|| SupervisorError::SpawnFailed(std::io::Error::new(std::io::ErrorKind::NotFound, "no entry file for analysis")))?;
        let env_file = ao_storage::config_store::read_env(&self.analysis_root, id.as_str())?;
        let ctx = SpawnContext {
            analysis_id: id.as_str().to_string(),
            entry_path,
            working_dir: self.analysis_root.join(id.as_str()),
            env: env_file.as_map().into_iter().collect(),
            dns_socket_path: self.dns_socket_path.clone(),
        };

        let mut child = self.launcher.spawn(&ctx).await.map_err(SupervisorError::SpawnFailed)?;
        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::SpawnFailed(std::io::Error::new(std::io::ErrorKind::Other, "child had no pid after spawn")))?;

        let (exited_tx, exited_rx) = watch::channel(false);
        guard.child = Some(ChildState { pid, exited: exited_rx });
        guard.intended_stopped = false;
        guard.connection_error_detected = false;
        if let Some(timer) = guard.restart_timer.take() {
            timer.abort();
        }
        drop(guard);

        self.store.append(StorageEvent::AnalysisStatusChanged { analysis_id: *id, status: AnalysisStatus::Running, pid: Some(pid) })?;
        self.store.append(StorageEvent::AnalysisIntendedStateSet { analysis_id: *id, intended_state: IntendedState::Running })?;
        self.publish_status(id, AnalysisStatus::Running, Some(pid));
        tracing::info!(analysis_id = %id, pid, "analysis started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let started_at = self.clock.now();
        let sup = Arc::clone(self);
        let id = *id;
        tokio::spawn(async move {
            sup.run_monitor(id, child, stdout, stderr, pid, started_at, exited_tx).await;
        });

        Ok(())
    }

    /// Stops the analysis's child process, waiting for it to actually exit
    /// before returning. Idempotent: a no-op if no
    /// child is currently attached.
    pub async fn stop(self: &Arc<Self>, id: &AnalysisId) -> Result<(), SupervisorError> {
        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        guard.intended_stopped = true;
        if let Some(timer) = guard.restart_timer.take() {
            timer.abort();
        }
        let child = guard.child.clone();
        drop(guard);

        self.store.append(StorageEvent::AnalysisIntendedStateSet { analysis_id: *id, intended_state: IntendedState::Stopped })?;

        let Some(child) = child else {
            return Ok(());
        };

        let mut exited = child.exited;
        if !*exited.borrow() {
            send_signal(child.pid, Signal::SIGTERM);
            tracing::debug!(analysis_id = %id, pid = child.pid, "sent SIGTERM, awaiting exit");
            let timed_out = tokio::time::timeout(self.force_kill_timeout, exited.changed()).await.is_err();
            if timed_out && !*exited.borrow() {
                tracing::warn!(analysis_id = %id, pid = child.pid, "force kill timeout elapsed, sending SIGKILL");
                send_signal(child.pid, Signal::SIGKILL);
            }
        }
        if !*exited.borrow() {
            let _ = exited.changed().await;
        }
        Ok(())
    }

    /// Unconditionally tears down an analysis: kills any running child,
    /// cancels any pending restart, and discards in-memory log state. Safe
    /// to call while a `start()` is in flight — it simply waits for that
    /// start's short critical section to finish, then kills whatever child
    /// resulted — cleanup interleaves safely with start via the
    /// latch.
    pub async fn cleanup(self: &Arc<Self>, id: &AnalysisId) -> Result<(), SupervisorError> {
        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        guard.intended_stopped = true;
        if let Some(timer) = guard.restart_timer.take() {
            timer.abort();
        }
        if let Some(child) = guard.child.take() {
            send_signal(child.pid, Signal::SIGKILL);
        }
        guard.log_buffer.clear();
        guard.log_initialized = false;
        guard.connection_error_detected = false;
        guard.restart_attempts = 0;
        drop(guard);

        self.store.append(StorageEvent::AnalysisStatusChanged { analysis_id: *id, status: AnalysisStatus::Stopped, pid: None })?;
        self.store.append(StorageEvent::AnalysisIntendedStateSet { analysis_id: *id, intended_state: IntendedState::Stopped })?;
        self.publish_status(id, AnalysisStatus::Stopped, None);
        Ok(())
    }

    /// Administrative status override, used by the HTTP layer for manual
    /// enable/disable toggling. Does not touch `intendedState` — only
    /// `start()`/`stop()` own that transition.
    pub fn update_status(&self, id: &AnalysisId, enabled: Option<bool>) -> Result<(), SupervisorError> {
        if let Some(enabled) = enabled {
            self.store.append(StorageEvent::AnalysisEnabledSet { analysis_id: *id, enabled })?;
        }
        Ok(())
    }

    /// Ensures the in-memory log ring has been loaded from disk, then
    /// returns it. Called lazily on first access rather than eagerly at
    /// daemon startup for every analysis.
    pub async fn initialize_log_state(self: &Arc<Self>, id: &AnalysisId) -> Result<(), SupervisorError> {
        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        self.ensure_log_initialized(id, &mut guard)
    }

    pub async fn get_memory_logs(self: &Arc<Self>, id: &AnalysisId, page: usize, limit: usize) -> Result<(Vec<LogEntry>, bool, usize), SupervisorError> {
        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        self.ensure_log_initialized(id, &mut guard)?;
        Ok(guard.log_buffer.page(page, limit))
    }

    pub async fn clear_logs(self: &Arc<Self>, id: &AnalysisId, clear_message: Option<&str>) -> Result<(), SupervisorError> {
        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        let buffer = ao_storage::log_pipeline::clear_logs(&self.analysis_root, id.as_str(), self.max_memory_logs, clear_message)?;
        guard.log_buffer = buffer;
        guard.sequence = if clear_message.is_some() { 1 } else { 0 };
        guard.log_initialized = true;
        drop(guard);

        self.fanout.broadcast_update(ao_core::LiveEvent::LogsCleared { analysis_id: *id, clear_message: clear_message.map(str::to_string) });
        Ok(())
    }

    /// Starts every analysis whose persisted `intendedState` is `running`,
    /// called once at daemon startup. Returns the ids that failed to start
    /// so the caller can log them; a single failure never blocks the rest.
    pub async fn reconcile_startup(self: &Arc<Self>) -> Vec<(AnalysisId, SupervisorError)> {
        let ids: Vec<AnalysisId> = self.store.with_state(|s| {
            s.analyses.values().filter(|a| a.intended_state == IntendedState::Running).map(|a| a.id).collect()
        });
        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.start(&id).await {
                failures.push((id, e));
            }
        }
        failures
    }

    async fn run_monitor(
        self: Arc<Self>,
        id: AnalysisId,
        mut child: tokio::process::Child,
        stdout: Option<tokio::process::ChildStdout>,
        stderr: Option<tokio::process::ChildStderr>,
        pid: u32,
        started_at: std::time::Instant,
        exited_tx: watch::Sender<bool>,
    ) {
        let stdout_task = stdout.map(|s| {
            let sup = Arc::clone(&self);
            tokio::spawn(async move { sup.read_stream(id, s, false).await })
        });
        let stderr_task = stderr.map(|s| {
            let sup = Arc::clone(&self);
            tokio::spawn(async move { sup.read_stream(id, s, true).await })
        });

        let status = child.wait().await;
        if let Some(t) = stdout_task {
            let _ = t.await;
        }
        if let Some(t) = stderr_task {
            let _ = t.await;
        }

        let ran_for = self.clock.now().saturating_duration_since(started_at);
        let exit_code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
        tracing::info!(analysis_id = %id, pid, exit_code, ran_for_ms = ran_for.as_millis() as u64, "analysis child exited");

        self.handle_exit(id, exit_code, ran_for).await;
        let _ = exited_tx.send(true);
    }

    async fn read_stream(self: Arc<Self>, id: AnalysisId, mut stream: impl tokio::io::AsyncRead + Unpin, is_stderr: bool) {
        let mut buf = [0u8; 8192];
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
            for line in output::split_lines(&chunk) {
                self.emit_line(&id, line, is_stderr).await;
            }
        }
    }

    async fn emit_line(self: &Arc<Self>, id: &AnalysisId, raw_line: &str, is_stderr: bool) {
        let message = output::prefix_stderr(raw_line, is_stderr);
        let is_connection_error = !is_stderr && output::is_connection_error_line(raw_line);

        let cell = self.runtime_cell(id);
        let mut guard = cell.lock().await;
        guard.sequence += 1;
        let entry = LogEntry { sequence: guard.sequence, timestamp: self.clock.epoch_ms(), level: if is_stderr { LogLevel::Error } else { LogLevel::Info }, message };
        guard.log_buffer.push(entry.clone());
        if let Err(e) = ao_storage::log_pipeline::append_log(&self.analysis_root, id.as_str(), &entry) {
            tracing::error!(analysis_id = %id, error = %e, "failed to append analysis log line");
        }
        let total_count = guard.log_buffer.total_log_count();
        let pid = guard.child.as_ref().map(|c| c.pid);
        if is_connection_error {
            guard.connection_error_detected = true;
        }
        drop(guard);

        self.fanout.broadcast_update(ao_core::LiveEvent::Log { analysis_id: *id, file_name: "analysis.log".to_string(), log: entry, total_count });

        if is_connection_error {
            tracing::warn!(analysis_id = %id, "connection-error heuristic fired, requesting cooperative shutdown");
            if let Some(pid) = pid {
                send_signal(pid, Signal::SIGTERM);
            }
        }
    }

    async fn handle_exit(self: &Arc<Self>, id: AnalysisId, exit_code: i32, ran_for: Duration) {
        let cell = self.runtime_cell(&id);
        let mut guard = cell.lock().await;

        let intended_stopped = guard.intended_stopped;
        let connection_error_detected = guard.connection_error_detected;
        guard.child = None;
        guard.connection_error_detected = false;

        let _ = self.store.append(StorageEvent::AnalysisStatusChanged { analysis_id: id, status: AnalysisStatus::Stopped, pid: None });
        self.publish_status(&id, AnalysisStatus::Stopped, None);

        // A run that outlived the short-lived threshold proved the child
        // stable, so a crash after that point starts the backoff curve over
        // rather than continuing to escalate from whatever it reached last
        // time. Rapid consecutive crashes (each <= the threshold) are the
        // only thing that should climb the curve.
        if ran_for > Duration::from_millis(crate::backoff::SHORT_LIVED_THRESHOLD_MS) {
            guard.restart_attempts = 0;
        }

        let disposition = classify_exit(exit_code, intended_stopped, connection_error_detected, ran_for);
        if disposition.should_restart() {
            guard.restart_attempts += 1;
            let delay = disposition.restart_delay(self.backoff, guard.restart_attempts).unwrap_or_default();
            tracing::info!(analysis_id = %id, ?disposition, delay_ms = delay.as_millis() as u64, attempt = guard.restart_attempts, "scheduling restart");
            let sup = Arc::clone(self);
            let timer = tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Err(e) = sup.start(&id).await {
                    tracing::warn!(analysis_id = %id, error = %e, "scheduled restart failed");
                }
            });
            guard.restart_timer = Some(timer);
        } else {
            guard.restart_attempts = 0;
        }
    }
}

fn send_signal(pid: u32, signal: Signal) {
    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, signal = ?signal, error = %e, "signal delivery failed (process likely already gone)");
    }
}

/// Locates `<analysisRoot>/<id>/index.*`, the upload handler's entry-file
/// convention. The first match in
/// directory order wins; analyses are expected to have exactly one.
fn find_entry_path(analysis_root: &Path, analysis_id: &str) -> Option<PathBuf> {
    let dir = ao_storage::safe_path::analysis_file_path(analysis_root, analysis_id, &[])?;
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.file_stem().and_then(|s| s.to_str()) == Some("index"))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
