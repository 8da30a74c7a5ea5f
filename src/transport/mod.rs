//! WebSocket transport layer.
//!
//! This module turns a dialed URL or an inbound HTTP upgrade into a
//! [`WebSocketConnection`] carrying text messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                               ┌──────────────────┐
//! │  Client          │          WebSocket            │  Server          │
//! │                  │                               │                  │
//! │  connect(url)    │──── GET + Upgrade headers ───►│  UpgradeRequest  │
//! │                  │◄─── 101 / 503 ────────────────│  → accept        │
//! │  Connection      │◄────── text frames ──────────►│  Connection      │
//! └──────────────────┘                               └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`WebSocketTransport::connect`] or [`WebSocketTransport::accept_upgrade`]
//! 2. `receive_message` / `send_message` from one reader and one writer task
//! 3. `keepalive_params` queried by the heartbeat coordinator
//! 4. `close` - idempotent, wakes blocked calls
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Outbound handshake |
//! | `connection` | Framed text connection |
//! | `server` | Inbound upgrade handshake |
//! | `websocket` | Transport value tying them together |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound handshake.
pub mod client;

/// Framed text connection.
pub mod connection;

/// Inbound upgrade handshake.
pub mod server;

/// WebSocket transport value.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionState, Socket, WebSocketConnection};
pub use server::UpgradeRequest;
pub use websocket::WebSocketTransport;

// ============================================================================
// Capability Traits
// ============================================================================

/// A live message connection, whatever the transport kind.
///
/// At most one `receive_message` and one `send_message` may be in flight at
/// a time; one of each concurrently is the normal full-duplex use.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Receives the next text message.
    async fn receive_message(&self) -> Result<String>;

    /// Sends one text message.
    async fn send_message(&self, message: &str) -> Result<()>;

    /// Closes the connection. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;

    /// Returns `(ping_interval, ping_timeout)` for the heartbeat coordinator.
    fn keepalive_params(&self) -> (Duration, Duration);

    /// Records that the server already answered the current exchange.
    ///
    /// Only meaningful for request/response transports.
    fn set_server_answered(&self, _answered: bool) {}

    /// Whether the server already answered the current exchange.
    fn server_answered(&self) -> bool {
        false
    }
}

/// Produces connections by dialing out or by accepting an inbound request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type produced by this transport.
    type Conn: Connection;

    /// Inbound request context consumed by [`Transport::accept`].
    type Request: Send;

    /// Dials `address` and completes the client handshake.
    async fn connect(&self, address: &str) -> Result<Self::Conn>;

    /// Completes the server handshake for an inbound request.
    async fn accept(&self, request: Self::Request) -> Result<Self::Conn>;

    /// Binds a session id to a connection.
    ///
    /// Only meaningful for request/response transports.
    fn set_sid(&self, _sid: &str, _conn: &Self::Conn) {}

    /// Serves a follow-up request on an existing session.
    ///
    /// Only meaningful for request/response transports.
    fn serve(&self, _request: &mut Self::Request) {}
}
