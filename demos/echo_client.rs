//! Echo client.
//!
//! Dials the echo server, sends a few messages and prints the replies along
//! with the keepalive cadence a heartbeat coordinator would use.
//!
//! Usage:
//!   cargo run --example echo_client
//!   cargo run --example echo_client -- ws://127.0.0.1:9000/

// ============================================================================
// Imports
// ============================================================================

use tracing_subscriber::EnvFilter;
use ws_transport::{Result, TransportConfig, WebSocketTransport};

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:8080/";

const MESSAGES: &[&str] = &["hello", "engine", "transport"];

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    let config = TransportConfig::default().with_header("user-agent", "ws-transport-echo")?;
    let transport = WebSocketTransport::try_new(config)?;

    let conn = transport.connect(&url).await?;
    let (interval, timeout) = conn.keepalive_params();
    println!("Connected to {url} (ping every {interval:?}, timeout {timeout:?})");

    for message in MESSAGES {
        conn.send_message(message).await?;
        let reply = conn.receive_message().await?;
        println!("  sent {message:?} -> got {reply:?}");
    }

    conn.close().await
}
