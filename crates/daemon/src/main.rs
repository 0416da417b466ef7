// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `aod` — the orchestrator daemon binary. Loads `orchestrator.toml`,
//! replays the metadata store, binds the DNS IPC socket and the HTTP
//! surface, and serves until asked to stop.

mod auth;
mod config;
mod lifecycle;
mod log_shipping;

use std::path::PathBuf;
use tracing_subscriber::prelude::*;

use config::Config;
use lifecycle::Daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("ORCHESTRATOR_CONFIG").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("orchestrator.toml"));
    let config = Config::load(&config_path)?;

    init_tracing(&config);

    let daemon = Daemon::startup(config).await?;
    let router = daemon.build_router();
    let bind_addr = daemon.config.bind_addr.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "orchestrator listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal().await?).await?;

    daemon.shutdown();
    Ok(())
}

/// Builds the combined ctrl-c/SIGTERM future up front so installing the
/// signal handler can fail fast at startup rather than inside the
/// graceful-shutdown future itself.
async fn shutdown_signal() -> anyhow::Result<impl std::future::Future<Output = ()>> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            sigterm.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        tracing::info!("shutdown signal received");
    })
}

fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_dir = config.daemon_log_path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."));
    let log_name = config.daemon_log_path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "orchestrator.log".into());
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Leaked deliberately: the guard must outlive every tracing call in the
    // process, and this only runs once at startup.
    Box::leak(Box::new(guard));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false);
    let shipping_layer = log_shipping::LogShippingLayer::new(config.log_shipping.endpoint.clone(), config.log_shipping.batch_size, config.log_shipping.flush_interval_ms);

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).with(shipping_layer).init();
}
