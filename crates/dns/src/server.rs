// SPDX-License-Identifier: MIT

//! The parent side of the IPC transport. Each child worker is launched with
//! an environment variable pointing at this Unix socket rather than patching
//! its own name resolver: the child's wrapper installs a small resolver
//! client that dials this socket and speaks the line-delimited JSON protocol
//! in [`crate::protocol`].

use crate::protocol::{DnsRequest, DnsResponse};
use crate::service::DnsService;
use ao_core::Clock;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("dns ipc io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binds `socket_path` (removing a stale socket file first) and serves
/// connections until the returned task is aborted. One task per connection;
/// a slow or malicious child cannot block other children's requests.
pub async fn serve<C: Clock + 'static>(socket_path: &std::path::Path, service: Arc<DnsService<C>>) -> Result<(), ServerError> {
    let _ = std::fs::remove_file(socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    loop {
        let (stream, _) = listener.accept().await?;
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, service).await {
                tracing::warn!(error = %e, "dns ipc connection ended with an error");
            }
        });
    }
}

async fn handle_connection<C: Clock + 'static>(stream: UnixStream, service: Arc<DnsService<C>>) -> Result<(), ServerError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if !service.enabled() {
            continue;
        }
        let parsed: Result<DnsRequest, _> = serde_json::from_str(&line);
        let response = match parsed {
            Ok(request) => service.handle_request(request).await,
            Err(_) => {
                let raw_type = serde_json::from_str::<serde_json::Value>(&line)
                    .ok()
                    .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
                    .unwrap_or_else(|| "<unparseable>".to_string());
                DnsService::<C>::reject_unknown(&raw_type);
                continue;
            }
        };
        let mut out = serde_json::to_vec(&response).unwrap_or_default();
        out.push(b'\n');
        write_half.write_all(&out).await?;
    }
    Ok(())
}
