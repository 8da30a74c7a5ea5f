//! Echo server.
//!
//! Accepts WebSocket upgrades and echoes every text message back until the
//! peer goes away.
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example echo_server -- 127.0.0.1:9000
//!
//! Set `RUST_LOG=debug` for transport logs.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ws_transport::{Result, UpgradeRequest, WebSocketConnection, WebSocketTransport};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let listener = TcpListener::bind(&addr).await?;
    let transport = WebSocketTransport::default();

    info!("Echo server listening on ws://{addr}/");

    loop {
        let (tcp, peer) = listener.accept().await?;
        let transport = transport.clone();

        tokio::spawn(async move {
            let request = match UpgradeRequest::from_tcp(tcp).await {
                Ok(request) => request,
                Err(e) => {
                    warn!(%peer, error = %e, "Bad request");
                    return;
                }
            };
            match transport.accept_upgrade(request).await {
                Ok(conn) => echo(Arc::new(conn)).await,
                Err(e) => warn!(%peer, error = %e, "Upgrade rejected"),
            }
        });
    }
}

async fn echo(conn: Arc<WebSocketConnection>) {
    loop {
        let message = match conn.receive_message().await {
            Ok(message) => message,
            Err(e) if e.is_protocol_violation() => {
                warn!(error = %e, "Dropping frame");
                continue;
            }
            Err(e) => {
                info!(error = %e, "Connection finished");
                break;
            }
        };

        if let Err(e) = conn.send_message(&message).await {
            warn!(error = %e, "Echo failed");
            break;
        }
    }

    let _ = conn.close().await;
}
