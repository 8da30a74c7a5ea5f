//! Shared helpers for integration tests.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use ws_transport::{TransportConfig, UpgradeRequest, WebSocketConnection, WebSocketTransport};

// ============================================================================
// Functions
// ============================================================================

/// Installs a test subscriber once. Set `RUST_LOG` to see output.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Binds a loopback listener on a random port.
pub async fn listen() -> anyhow::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

/// WebSocket URL for a bound address.
pub fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/engine/")
}

/// Accepts one TCP connection and upgrades it.
pub async fn accept_one(
    listener: &TcpListener,
    transport: &WebSocketTransport,
) -> ws_transport::Result<WebSocketConnection> {
    let (tcp, _) = listener.accept().await?;
    let request = UpgradeRequest::from_tcp(tcp).await?;
    transport.accept_upgrade(request).await
}

/// Returns `(server, client)` connected over loopback, both using `config`.
pub async fn connected_pair(
    config: TransportConfig,
) -> anyhow::Result<(WebSocketConnection, WebSocketConnection)> {
    init_logging();

    let (listener, addr) = listen().await?;
    let transport = WebSocketTransport::new(config);
    let url = ws_url(addr);

    let (server, client) = tokio::join!(accept_one(&listener, &transport), transport.connect(&url));
    Ok((server?, client?))
}
