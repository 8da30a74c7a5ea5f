//! Framed text connection over one WebSocket.
//!
//! The socket is split into a read half and a write half, each behind its own
//! async mutex, so one reader task and one writer task can run at the same
//! time. Open/closed state is broadcast on a watch channel; `close` flips it
//! and any call blocked on the socket returns [`Error::ConnectionClosed`].
//!
//! # Deadlines
//!
//! Each receive and send gets a fresh deadline from the owning
//! [`TransportConfig`]. Expiry surfaces as an IO `TimedOut` error.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout, timeout_at};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::Connection;

// ============================================================================
// Types
// ============================================================================

/// Socket type produced by dialing.
pub type Socket = MaybeTlsStream<TcpStream>;

type Reader<S> = SplitStream<WebSocketStream<S>>;

type Writer<S> = SplitSink<WebSocketStream<S>, Message>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a [`WebSocketConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected and usable.
    Open,
    /// Closed by [`WebSocketConnection::close`]. Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Closed`].
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ============================================================================
// WebSocketConnection
// ============================================================================

/// One WebSocket carrying non-empty text messages.
///
/// Not `Clone`: it owns the socket. Wrap it in an `Arc` to hand the read and
/// write sides to different tasks.
pub struct WebSocketConnection<S = Socket> {
    /// Log identifier.
    id: ConnectionId,
    /// Read half, `None` once closed.
    reader: Mutex<Option<Reader<S>>>,
    /// Write half, `None` once closed.
    writer: Mutex<Option<Writer<S>>>,
    /// Open/closed state, observed by in-flight calls.
    state: watch::Sender<ConnectionState>,
    /// Owning transport configuration.
    config: Arc<TransportConfig>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established WebSocket stream.
    pub(crate) fn new(stream: WebSocketStream<S>, config: Arc<TransportConfig>) -> Self {
        let id = ConnectionId::generate();
        let (writer, reader) = stream.split();
        let (state, _) = watch::channel(ConnectionState::Open);

        debug!(connection_id = %id, "Connection opened");

        Self {
            id,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            state,
            config,
        }
    }

    /// Receives the next text message.
    ///
    /// Ping and pong frames are answered by the protocol layer and skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::BinaryMessage`] for a binary frame; the connection stays open
    /// - [`Error::BadBuffer`] if the payload cannot be materialized
    /// - [`Error::PacketWrong`] for an empty text frame
    /// - [`Error::ConnectionClosed`] after `close` or a peer close frame
    /// - [`Error::Io`] with kind `TimedOut` once `receive_timeout` passes
    pub async fn receive_message(&self) -> Result<String> {
        let limit = self.config.receive_timeout;
        let deadline = Instant::now() + limit;
        let state = self.state.subscribe();

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        let message = tokio::select! {
            biased;
            () = wait_closed(state) => return Err(Error::ConnectionClosed),
            next = timeout_at(deadline, next_data_message(reader)) => {
                next.map_err(|_| Error::deadline_exceeded("receive", limit))??
            }
        };

        let text = decode_text(message)?;
        trace!(connection_id = %self.id, len = text.len(), "Message received");
        Ok(text)
    }

    /// Sends one text message as a single frame.
    ///
    /// A failed send is not retried and may or may not have reached the peer.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] after `close`
    /// - [`Error::Io`] with kind `TimedOut` once `send_timeout` passes
    /// - any socket error, unmodified
    pub async fn send_message(&self, message: &str) -> Result<()> {
        let limit = self.config.send_timeout;
        let deadline = Instant::now() + limit;
        let state = self.state.subscribe();

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::ConnectionClosed)?;

        tokio::select! {
            biased;
            () = wait_closed(state) => return Err(Error::ConnectionClosed),
            sent = timeout_at(deadline, write_text(writer, message)) => {
                sent.map_err(|_| Error::deadline_exceeded("send", limit))??
            }
        }

        trace!(connection_id = %self.id, len = message.len(), "Message sent");
        Ok(())
    }

    /// Closes the connection.
    ///
    /// The first call wakes blocked reads and writes, sends a close frame and
    /// releases the socket. Later calls return `Ok(())` without doing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the close frame could not be written.
    pub async fn close(&self) -> Result<()> {
        let previous = self.state.send_replace(ConnectionState::Closed);
        if previous.is_closed() {
            trace!(connection_id = %self.id, "Connection already closed");
            return Ok(());
        }

        let writer = self.writer.lock().await.take();
        let reader = self.reader.lock().await.take();

        let result = match writer {
            Some(mut writer) => close_writer(&mut writer, self.config.send_timeout).await,
            None => Ok(()),
        };

        drop(reader);
        debug!(connection_id = %self.id, ok = result.is_ok(), "Connection closed");
        result
    }
}

impl<S> fmt::Debug for WebSocketConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<S> WebSocketConnection<S> {
    /// Returns `(ping_interval, ping_timeout)` from the owning configuration.
    #[inline]
    #[must_use]
    pub fn keepalive_params(&self) -> (Duration, Duration) {
        self.config.keepalive_params()
    }

    /// Returns the log identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the owning configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Arc<TransportConfig> {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns `true` once `close` has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }
}

#[async_trait]
impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive_message(&self) -> Result<String> {
        WebSocketConnection::receive_message(self).await
    }

    async fn send_message(&self, message: &str) -> Result<()> {
        WebSocketConnection::send_message(self, message).await
    }

    async fn close(&self) -> Result<()> {
        WebSocketConnection::close(self).await
    }

    fn keepalive_params(&self) -> (Duration, Duration) {
        WebSocketConnection::keepalive_params(self)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolves once the state becomes closed.
async fn wait_closed(mut state: watch::Receiver<ConnectionState>) {
    loop {
        let closed = state.borrow_and_update().is_closed();
        if closed || state.changed().await.is_err() {
            return;
        }
    }
}

/// Reads until a data frame, close frame or error arrives.
async fn next_data_message<S>(reader: &mut Reader<S>) -> Result<Message>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match reader.next().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Close frame received");
                return Err(Error::ConnectionClosed);
            }
            Some(Ok(message)) => return Ok(message),
            Some(Err(e)) => return Err(read_error(e)),
            None => return Err(Error::ConnectionClosed),
        }
    }
}

/// Payload decoding failures become [`Error::BadBuffer`]; the rest pass through.
fn read_error(err: WsError) -> Error {
    match err {
        WsError::Utf8 { .. } | WsError::Capacity { .. } => Error::bad_buffer(err),
        other => other.into(),
    }
}

/// Accepts only non-empty text.
fn decode_text(message: Message) -> Result<String> {
    match message {
        Message::Text(text) if text.as_str().is_empty() => Err(Error::PacketWrong),
        Message::Text(text) => Ok(text.as_str().to_owned()),
        _ => Err(Error::BinaryMessage),
    }
}

async fn write_text<S>(writer: &mut Writer<S>, message: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    writer.feed(Message::text(message.to_owned())).await?;
    writer.flush().await?;
    Ok(())
}

async fn close_writer<S>(writer: &mut Writer<S>, limit: Duration) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(limit, writer.close()).await {
        Ok(Ok(())) | Ok(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::deadline_exceeded("close", limit)),
    }
}

// ============================================================================
// Tests
// ============================================================================
