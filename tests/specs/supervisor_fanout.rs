// SPDX-License-Identifier: MIT

//! Supervisor + metadata store + fan-out wired together, subscribed the way
//! a browser session actually would be — crash backoff, then a manual stop
//! cancelling the pending restart, observed through the live-event channel
//! rather than by polling the store.

use crate::prelude::Harness;
use ao_core::LiveEvent;
use ao_supervisor::BackoffPolicy;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn crashing_listener_backs_off_then_manual_stop_cancels_restart() {
    let h = Harness::new();
    let id = h.register_analysis("exit 1", None);

    let (session, mut rx) = h.fanout.add_client("us-1", false);
    h.fanout.subscribe(&session.id, [id.as_str().to_string()]);

    // patch in a fast backoff so the test doesn't wait on the real 5s/60s
    // defaults; the ratio (exponential, capped) is what scenario 1 checks.
    let fast = build_fast_supervisor(&h, BackoffPolicy { initial_delay_ms: 20, max_delay_ms: 200 });

    fast.start(&id).await.unwrap();

    // first crash + scheduled restart should surface a status event.
    let first_status = next_status_event(&mut rx, Duration::from_millis(500)).await;
    assert!(first_status.is_some(), "expected at least one analysisStatus event after the first crash");

    // let a couple of crash/restart cycles elapse, then issue a manual stop;
    // no further restart should be scheduled afterward.
    tokio::time::sleep(Duration::from_millis(120)).await;
    fast.stop(&id).await.unwrap();

    let analysis = h.store.with_state(|s| s.get_analysis(&id).cloned()).unwrap();
    assert_eq!(analysis.intended_state, ao_core::IntendedState::Stopped);

    // drain anything already in flight, then assert quiescence: no new
    // restart fires once intendedState is stopped.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(rx.try_recv().is_err(), "no further lifecycle events once stop() has been called");

    let analysis = h.store.with_state(|s| s.get_analysis(&id).cloned()).unwrap();
    assert_eq!(analysis.status, ao_core::AnalysisStatus::Stopped);
}

#[tokio::test]
async fn log_sequence_numbers_are_strictly_increasing_and_deduped_by_subscriber() {
    let h = Harness::new();
    let id = h.register_analysis("echo one; echo two; echo three", None);
    let (session, mut rx) = h.fanout.add_client("us-1", false);
    h.fanout.subscribe(&session.id, [id.as_str().to_string()]);

    h.supervisor.start(&id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let mut sequences = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let LiveEvent::Log { log, .. } = event {
            sequences.push(log.sequence);
        }
    }
    assert!(sequences.len() >= 3, "expected at least 3 log events, got {sequences:?}");
    for pair in sequences.windows(2) {
        assert!(pair[1] > pair[0], "sequence must be strictly increasing: {sequences:?}");
    }

    h.supervisor.cleanup(&id).await.unwrap();
}

// The harness's supervisor is built with the default backoff; this helper
// rebuilds one with a fast policy against the same store/fanout/analysis
// root so the crash-loop scenario doesn't wait on production timings.
fn build_fast_supervisor(h: &Harness, backoff: BackoffPolicy) -> Arc<ao_supervisor::AnalysisSupervisor<ao_core::FakeClock>> {
    Arc::new(
        ao_supervisor::AnalysisSupervisor::new(
            h.clock.clone(),
            h.analysis_root.clone(),
            h._root.path().join("dns.sock"),
            Arc::clone(&h.fanout),
            Arc::clone(&h.store),
            Arc::new(ao_supervisor::ShellLauncher),
        )
        .with_backoff(backoff)
        .with_force_kill_timeout(Duration::from_millis(200)),
    )
}

async fn next_status_event(rx: &mut tokio::sync::mpsc::Receiver<LiveEvent>, timeout: Duration) -> Option<LiveEvent> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Some(ev @ LiveEvent::AnalysisStatus { .. }) => return Some(ev),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
