// SPDX-License-Identifier: MIT

use crate::launcher::ShellLauncher;
use crate::{AnalysisSupervisor, BackoffPolicy, SupervisorError};
use ao_core::{Analysis, AnalysisId, AnalysisStatus, SystemClock};
use ao_fanout::FanoutHub;
use ao_storage::event::StorageEvent;
use ao_storage::MetadataStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Registers a fresh analysis in the store and writes its entry script,
/// returning everything a test needs to drive the supervisor against it.
struct Fixture {
    _root: TempDir,
    analysis_root: std::path::PathBuf,
    store: Arc<MetadataStore>,
    supervisor: Arc<AnalysisSupervisor<SystemClock>>,
    id: AnalysisId,
}

fn fixture(script: &str, backoff: BackoffPolicy) -> Fixture {
    let root = TempDir::new().unwrap();
    let analysis_root = root.path().join("analyses");
    let store_root = root.path().join("store");
    std::fs::create_dir_all(&analysis_root).unwrap();

    let store = Arc::new(MetadataStore::open(&store_root).unwrap());
    let analysis = Analysis::new("test-analysis", None);
    let id = analysis.id;
    store.append(StorageEvent::AnalysisCreated { analysis }).unwrap();

    let dir = analysis_root.join(id.as_str());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.sh"), script).unwrap();

    let fanout = Arc::new(FanoutHub::new());
    let supervisor = Arc::new(
        AnalysisSupervisor::new(SystemClock, analysis_root.clone(), root.path().join("dns.sock"), fanout, Arc::clone(&store), Arc::new(ShellLauncher))
            .with_backoff(backoff)
            .with_force_kill_timeout(Duration::from_millis(300)),
    );

    Fixture { _root: root, analysis_root, store, supervisor, id }
}

#[tokio::test]
async fn start_sets_running_status_with_pid() {
    let f = fixture("sleep 30", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();

    // give the spawn a moment to land in the store
    tokio::time::sleep(Duration::from_millis(50)).await;
    let analysis = f.store.with_state(|s| s.get_analysis(&f.id).cloned()).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Running);
    assert!(analysis.pid.is_some());

    f.supervisor.stop(&f.id).await.unwrap();
}

#[tokio::test]
async fn stop_waits_for_exit_and_clears_pid() {
    let f = fixture("trap '' TERM; sleep 30", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // the script ignores SIGTERM, so stop() must escalate to SIGKILL after
    // the configured force-kill timeout (300ms in this fixture) and still
    // return once the child is actually gone.
    let start = std::time::Instant::now();
    f.supervisor.stop(&f.id).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));

    let analysis = f.store.with_state(|s| s.get_analysis(&f.id).cloned()).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Stopped);
    assert!(analysis.pid.is_none());
}

#[tokio::test]
async fn stop_is_idempotent_when_nothing_is_running() {
    let f = fixture("true", BackoffPolicy::default());
    f.supervisor.stop(&f.id).await.unwrap();
    f.supervisor.stop(&f.id).await.unwrap();
}

#[tokio::test]
async fn crash_triggers_restart_after_backoff() {
    let fast_backoff = BackoffPolicy { initial_delay_ms: 30, max_delay_ms: 200 };
    let f = fixture("exit 7", fast_backoff);
    f.supervisor.start(&f.id).await.unwrap();

    // after the first crash+restart cycle the analysis should be running
    // again with a fresh pid, well within a couple of backoff windows.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let analysis = f.store.with_state(|s| s.get_analysis(&f.id).cloned()).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Running);

    f.supervisor.cleanup(&f.id).await.unwrap();
}

#[tokio::test]
async fn crash_backoff_escalates_across_real_restart_cycles() {
    // Each crash runs near-instantly (exit 7, no sleep), so the gap between
    // one pid appearing and the next is dominated by the scheduled restart
    // delay. If `restart_attempts` were wrongly reset to 0 on every
    // successful fork (as it used to be, at the top of `start()`), every
    // gap here would come out ~equal to `initial_delay_ms` instead of
    // doubling each time.
    let fast_backoff = BackoffPolicy { initial_delay_ms: 40, max_delay_ms: 300 };
    let f = fixture("exit 7", fast_backoff);
    f.supervisor.start(&f.id).await.unwrap();

    let mut last_pid = None;
    let mut last_change = std::time::Instant::now();
    let mut gaps = Vec::new();
    let deadline = std::time::Instant::now() + Duration::from_millis(2_000);
    while std::time::Instant::now() < deadline && gaps.len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let pid = f.store.with_state(|s| s.get_analysis(&f.id).and_then(|a| a.pid));
        if let Some(p) = pid {
            if last_pid != Some(p) {
                if last_pid.is_some() {
                    gaps.push(last_change.elapsed());
                }
                last_pid = Some(p);
                last_change = std::time::Instant::now();
            }
        }
    }

    f.supervisor.cleanup(&f.id).await.unwrap();

    assert!(gaps.len() >= 2, "expected at least two restart gaps, got {gaps:?}");
    assert!(gaps[1] > gaps[0], "restart delay did not escalate: {gaps:?}");
}

#[tokio::test]
async fn manual_stop_suppresses_restart() {
    let fast_backoff = BackoffPolicy { initial_delay_ms: 30, max_delay_ms: 200 };
    let f = fixture("sleep 30", fast_backoff);
    f.supervisor.start(&f.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    f.supervisor.stop(&f.id).await.unwrap();
    // wait well past a backoff window; intendedState=stopped must suppress
    // the restart that a crash would otherwise schedule.
    tokio::time::sleep(Duration::from_millis(250)).await;

    let analysis = f.store.with_state(|s| s.get_analysis(&f.id).cloned()).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Stopped);
}

#[tokio::test]
async fn concurrent_start_fails_fast() {
    let f = fixture("sleep 30", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();
    let result = f.supervisor.start(&f.id).await;
    assert!(matches!(result, Err(SupervisorError::AlreadyStarting(_))));

    f.supervisor.cleanup(&f.id).await.unwrap();
}

#[tokio::test]
async fn start_unknown_analysis_is_not_found() {
    let f = fixture("true", BackoffPolicy::default());
    let unknown = AnalysisId::new();
    let result = f.supervisor.start(&unknown).await;
    assert!(matches!(result, Err(SupervisorError::NotFound(_))));
}

#[tokio::test]
async fn stdout_lines_land_in_memory_logs_and_on_disk() {
    let f = fixture("echo hello; echo world", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (logs, _, total) = f.supervisor.get_memory_logs(&f.id, 1, 10).await.unwrap();
    assert!(total >= 2);
    assert!(logs.iter().any(|l| l.message == "world"));

    let log_file = f.analysis_root.join(f.id.as_str()).join("analysis.log");
    assert!(log_file.exists());
}

#[tokio::test]
async fn stderr_lines_get_error_prefix() {
    let f = fixture("echo oops 1>&2", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (logs, _, _) = f.supervisor.get_memory_logs(&f.id, 1, 10).await.unwrap();
    assert!(logs.iter().any(|l| l.message == "ERROR: oops"));
}

#[tokio::test]
async fn clear_logs_resets_memory_ring() {
    let f = fixture("echo hello", BackoffPolicy::default());
    f.supervisor.start(&f.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    f.supervisor.cleanup(&f.id).await.unwrap();

    f.supervisor.clear_logs(&f.id, Some("cleared for test")).await.unwrap();
    let (logs, _, total) = f.supervisor.get_memory_logs(&f.id, 1, 10).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(logs[0].message, "cleared for test");
}

#[tokio::test]
async fn reconcile_startup_restarts_analyses_marked_running() {
    let f = fixture("sleep 30", BackoffPolicy::default());
    f.store.append(StorageEvent::AnalysisIntendedStateSet { analysis_id: f.id, intended_state: ao_core::IntendedState::Running }).unwrap();

    let failures = f.supervisor.reconcile_startup().await;
    assert!(failures.is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let analysis = f.store.with_state(|s| s.get_analysis(&f.id).cloned()).unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Running);

    f.supervisor.cleanup(&f.id).await.unwrap();
}
