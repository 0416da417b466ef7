// SPDX-License-Identifier: MIT

//! How a per-analysis child worker is actually brought to life: forks a
//! child process configured with working directory, environment, and the
//! entry point resolved from the uploaded source. Kept behind a trait so
//! tests can swap in a launcher that runs a plain shell script instead of a
//! real interpreter.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Child;

/// Everything the Supervisor has already resolved about one start attempt:
/// the entry file on disk, the working directory, the analysis's `.env`
/// contents, and where the shared DNS resolver's IPC socket lives (the
/// child is expected to dial it rather than resolve hostnames itself).
#[derive(Debug, Clone)]
pub struct SpawnContext {
    pub analysis_id: String,
    pub entry_path: PathBuf,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    pub dns_socket_path: PathBuf,
}

#[async_trait]
pub trait ChildLauncher: Send + Sync + 'static {
    async fn spawn(&self, ctx: &SpawnContext) -> std::io::Result<Child>;
}

fn base_command(ctx: &SpawnContext) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(&ctx.entry_path);
    cmd.current_dir(&ctx.working_dir)
        .env_clear()
        .envs(std::env::vars().filter(|(k, _)| k == "PATH" || k == "HOME"))
        .envs(ctx.env.iter().cloned())
        .env("AO_ANALYSIS_ID", &ctx.analysis_id)
        .env("AO_DNS_SOCKET", &ctx.dns_socket_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Execs the entry file directly. Its shebang (`#!/usr/bin/env node`, etc.)
/// decides what actually runs; the upload handler is responsible for making
/// the file executable.
#[derive(Debug, Default)]
pub struct DefaultLauncher;

#[async_trait]
impl ChildLauncher for DefaultLauncher {
    async fn spawn(&self, ctx: &SpawnContext) -> std::io::Result<Child> {
        base_command(ctx).spawn()
    }
}

/// Runs the entry file as a `/bin/sh` script regardless of its shebang (or
/// lack of one). Used by tests exercising the crash/backoff/connection-error
/// scenarios without depending on a real script interpreter.
#[derive(Debug, Default)]
pub struct ShellLauncher;

#[async_trait]
impl ChildLauncher for ShellLauncher {
    async fn spawn(&self, ctx: &SpawnContext) -> std::io::Result<Child> {
        let mut cmd = tokio::process::Command::new("/bin/sh");
        cmd.arg(&ctx.entry_path);
        cmd.current_dir(&ctx.working_dir)
            .env_clear()
            .envs(std::env::vars().filter(|(k, _)| k == "PATH" || k == "HOME"))
            .envs(ctx.env.iter().cloned())
            .env("AO_ANALYSIS_ID", &ctx.analysis_id)
            .env("AO_DNS_SOCKET", &ctx.dns_socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.spawn()
    }
}
