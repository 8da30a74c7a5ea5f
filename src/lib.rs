//! WebSocket transport for an engine-style real-time messaging layer.
//!
//! The crate provides one transport kind, WebSocket, behind capability
//! traits ([`Connection`], [`Transport`]) so that transport-agnostic code
//! above it can drive any transport the same way.
//!
//! # Architecture
//!
//! - **Configuration**: [`TransportConfig`] is immutable and shared by every
//!   connection a transport produces
//! - **Client**: [`WebSocketTransport::connect`] dials a `ws://` URL
//! - **Server**: [`WebSocketTransport::accept_upgrade`] upgrades an inbound
//!   [`UpgradeRequest`], answering 503 on rejection
//! - **Connection**: [`WebSocketConnection`] exchanges non-empty text
//!   messages with per-call deadlines
//!
//! Heartbeats are not sent here. [`Connection::keepalive_params`] reports the
//! cadence to whatever coordinates liveness.
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_transport::{Result, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = WebSocketTransport::default();
//!     let conn = transport.connect("ws://127.0.0.1:8080/engine/").await?;
//!
//!     conn.send_message("hello").await?;
//!     let reply = conn.receive_message().await?;
//!     println!("{reply}");
//!
//!     conn.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Configuration and settings loading |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`transport`] | Traits, connection, client and server handshakes |

// ============================================================================
// Modules
// ============================================================================

/// Transport configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{TransportConfig, TransportParams, TransportSettings};

// Error types
pub use error::{Error, ErrorKind, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{
    Connection, ConnectionState, Socket, Transport, UpgradeRequest, WebSocketConnection,
    WebSocketTransport,
};
