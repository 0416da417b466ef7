// SPDX-License-Identifier: MIT

//! Drives the real `aod` binary rather than any in-process harness: the
//! exclusive lock-file behavior in `ao_daemon::lifecycle::Daemon::startup`
//! ("another instance is already running") can only be observed by actually
//! racing two OS processes against the same state directory.

use assert_cmd::cargo::cargo_bin;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::time::Duration;

fn write_config(state_dir: &std::path::Path) -> std::path::PathBuf {
    let config_path = state_dir.join("orchestrator.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    writeln!(file, "state_dir = {:?}", state_dir.display().to_string()).unwrap();
    writeln!(file, "bind_addr = \"127.0.0.1:0\"").unwrap();
    config_path
}

/// Kills the child on drop so a failing assertion never leaves a daemon
/// process running past the test.
struct ChildGuard(std::process::Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn second_instance_refuses_to_start_while_the_lock_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let first = Command::new(cargo_bin("aod")).env("ORCHESTRATOR_CONFIG", &config_path).stdout(Stdio::null()).stderr(Stdio::null()).spawn().unwrap();
    let mut first = ChildGuard(first);

    // give the first instance time to acquire the lock and bind its socket
    // before racing the second one against it.
    let lock_path = dir.path().join("orchestrator.pid");
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !lock_path.exists() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(lock_path.exists(), "first instance never wrote its lock file");
    std::thread::sleep(Duration::from_millis(200));

    let second = Command::new(cargo_bin("aod"))
        .env("ORCHESTRATOR_CONFIG", &config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(!second.success(), "second instance should refuse to start while the lock is held");

    assert!(matches!(first.0.try_wait(), Ok(None)), "first instance should still be running");
}
