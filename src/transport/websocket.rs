//! The WebSocket transport value.
//!
//! [`WebSocketTransport`] owns the shared configuration. Dialing lives in
//! `client`, upgrading in `server`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{TransportConfig, TransportParams};
use crate::error::Result;

use super::Transport;
use super::connection::{Socket, WebSocketConnection};
use super::server::UpgradeRequest;

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket transport.
///
/// Cheap to clone; clones share one configuration.
///
/// # Example
///
/// ```ignore
/// use ws_transport::{TransportConfig, UpgradeRequest, WebSocketTransport};
///
/// let transport = WebSocketTransport::new(TransportConfig::default());
///
/// // Server side
/// let (tcp, _) = listener.accept().await?;
/// let conn = transport.accept_upgrade(UpgradeRequest::from_tcp(tcp).await?).await?;
///
/// // Client side
/// let conn = transport.connect("ws://127.0.0.1:8080/engine/").await?;
/// conn.send_message("hello").await?;
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: Arc<TransportConfig>,
}

impl WebSocketTransport {
    /// Creates a transport with the given configuration.
    ///
    /// The configuration is taken as is; use [`WebSocketTransport::try_new`]
    /// for settings that come from outside the program.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Validates `config`, then creates a transport with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if
    /// [`TransportConfig::validate`] rejects the configuration.
    pub fn try_new(config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Creates a transport with default settings and the given overrides.
    #[must_use]
    pub fn with_params(params: TransportParams) -> Self {
        Self::new(TransportConfig::with_params(params))
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Shared handle given to each connection.
    #[inline]
    pub(crate) fn shared_config(&self) -> &Arc<TransportConfig> {
        &self.config
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Conn = WebSocketConnection<Socket>;
    type Request = UpgradeRequest<Socket>;

    async fn connect(&self, address: &str) -> Result<Self::Conn> {
        WebSocketTransport::connect(self, address).await
    }

    async fn accept(&self, request: Self::Request) -> Result<Self::Conn> {
        self.accept_upgrade(request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
