//! Outbound WebSocket handshake.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::debug;
use url::Url;

use crate::error::Result;

use super::connection::WebSocketConnection;
use super::websocket::WebSocketTransport;

// ============================================================================
// Connector
// ============================================================================

impl WebSocketTransport {
    /// Dials `address` and completes the WebSocket handshake.
    ///
    /// The configuration's extra headers are added to the handshake request.
    /// `wss://` addresses need the `native-tls` or `rustls-tls` feature.
    ///
    /// # Errors
    ///
    /// Returns the address, network or handshake error unmodified
    /// ([`Error::Url`](crate::Error::Url), [`Error::Io`](crate::Error::Io) or
    /// [`Error::WebSocket`](crate::Error::WebSocket)).
    pub async fn connect(&self, address: &str) -> Result<WebSocketConnection> {
        let url = Url::parse(address)?;
        let mut request = url.as_str().into_client_request()?;

        if let Some(headers) = &self.config().headers {
            for (name, value) in headers {
                request.headers_mut().append(name.clone(), value.clone());
            }
        }

        let (socket, response) =
            connect_async_with_config(request, Some(self.config().websocket_config()), false)
                .await?;

        debug!(%url, status = %response.status(), "WebSocket handshake completed");

        Ok(WebSocketConnection::new(socket, Arc::clone(self.shared_config())))
    }
}

// ============================================================================
// Tests
// ============================================================================
