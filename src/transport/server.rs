//! Inbound WebSocket upgrade.
//!
//! The server side receives an HTTP/1.1 request head and the raw stream it
//! arrived on. A successful upgrade answers `101 Switching Protocols` and
//! hands the stream to the WebSocket layer. Every rejection answers `503`
//! with a plain-text `Upgrade failed: <detail>` body.
//!
//! # Upgrade Flow
//!
//! 1. [`UpgradeRequest::read`] parses the head (or [`UpgradeRequest::new`]
//!    wraps one parsed elsewhere)
//! 2. Method must be `GET`
//! 3. The handshake headers and HTTP version are checked by the protocol
//!    layer, which also builds the `101` answer
//! 4. `101` is written and the stream becomes a [`WebSocketConnection`]

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::handshake::server::{Request, create_response, write_response};
use tokio_tungstenite::tungstenite::http::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::http::{Method, Version};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::connection::{Socket, WebSocketConnection};
use super::websocket::WebSocketTransport;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of every rejection body.
const UPGRADE_FAILED: &str = "Upgrade failed: ";

/// Largest request head accepted before the request is rejected.
const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Maximum number of headers in a request head.
const MAX_HEADERS: usize = 64;

// ============================================================================
// UpgradeRequest
// ============================================================================

/// An inbound HTTP request that may be upgraded.
///
/// Holds the request method and headers plus the stream the request came
/// in on. Bytes the client sent after the head are kept and replayed to the
/// WebSocket layer.
pub struct UpgradeRequest<S> {
    method: String,
    path: String,
    version: Version,
    headers: HeaderMap,
    stream: S,
    buffered: Vec<u8>,
}

impl<S> fmt::Debug for UpgradeRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgradeRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

impl<S> UpgradeRequest<S> {
    /// Wraps a request head that was already parsed.
    ///
    /// `stream` must be positioned right after the head. The HTTP version
    /// defaults to 1.1; see [`UpgradeRequest::with_version`].
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: HeaderMap,
        stream: S,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            version: Version::HTTP_11,
            headers,
            stream,
            buffered: Vec::new(),
        }
    }

    /// Sets the HTTP version the request head declared.
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Request method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP version of the request head.
    #[inline]
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Request headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl UpgradeRequest<Socket> {
    /// Reads a request head from an accepted TCP stream.
    ///
    /// # Errors
    ///
    /// See [`UpgradeRequest::read`].
    pub async fn from_tcp(stream: TcpStream) -> Result<Self> {
        Self::read(MaybeTlsStream::Plain(stream)).await
    }
}

impl<S> UpgradeRequest<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads and parses one HTTP/1.1 request head from `stream`.
    ///
    /// # Errors
    ///
    /// - [`Error::HttpUpgradeFailed`] if the head is malformed or too large;
    ///   the client has been answered with 503
    /// - [`Error::Io`] if the stream fails or ends before the head does
    pub async fn read(mut stream: S) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(1024);

        loop {
            match parse_head(&buf) {
                Ok(Some((head, len))) => {
                    let buffered = buf.split_off(len).to_vec();
                    debug!(method = %head.method, path = %head.path, "Request head read");
                    return Ok(Self {
                        method: head.method,
                        path: head.path,
                        version: head.version,
                        headers: head.headers,
                        stream,
                        buffered,
                    });
                }
                Ok(None) if buf.len() >= MAX_HEAD_SIZE => {
                    let reason = "request head too large";
                    reject(&mut stream, reason).await;
                    return Err(Error::upgrade_failed(reason));
                }
                Ok(None) => {}
                Err(reason) => {
                    reject(&mut stream, &reason).await;
                    return Err(Error::upgrade_failed(reason));
                }
            }

            if stream.read_buf(&mut buf).await? == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stream ended inside request head",
                )));
            }
        }
    }
}

// ============================================================================
// Acceptor
// ============================================================================

impl WebSocketTransport {
    /// Upgrades an inbound request to a WebSocket connection.
    ///
    /// Read and write buffers are sized by the configuration's
    /// `buffer_size`.
    ///
    /// # Errors
    ///
    /// - [`Error::MethodNotAllowed`] if the method is not `GET`; no upgrade
    ///   is attempted
    /// - [`Error::HttpUpgradeFailed`] if the handshake is invalid or the
    ///   `101` could not be written
    ///
    /// In both cases the client has been answered with 503 where the stream
    /// still allowed it.
    pub async fn accept_upgrade<S>(
        &self,
        request: UpgradeRequest<S>,
    ) -> Result<WebSocketConnection<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let UpgradeRequest {
            method,
            path,
            version,
            headers,
            mut stream,
            buffered,
        } = request;

        if method != "GET" {
            debug!(%method, %path, "Upgrade rejected: method not allowed");
            reject(&mut stream, &Error::MethodNotAllowed.to_string()).await;
            return Err(Error::MethodNotAllowed);
        }

        let response = match switching_protocols(&path, version, headers) {
            Ok(response) => response,
            Err(reason) => {
                debug!(%path, %reason, "Upgrade rejected");
                reject(&mut stream, &reason).await;
                return Err(Error::upgrade_failed(reason));
            }
        };

        if let Err(e) = write_all_flush(&mut stream, &response).await {
            let reason = e.to_string();
            reject(&mut stream, &reason).await;
            return Err(Error::upgrade_failed(reason));
        }

        let socket = WebSocketStream::from_partially_read(
            stream,
            buffered,
            Role::Server,
            Some(self.config().websocket_config()),
        )
        .await;

        info!(%path, "WebSocket upgrade completed");

        Ok(WebSocketConnection::new(socket, Arc::clone(self.shared_config())))
    }
}

// ============================================================================
// Head Parsing
// ============================================================================

#[derive(Debug)]
struct RequestHead {
    method: String,
    path: String,
    version: Version,
    headers: HeaderMap,
}

/// Parses a complete head, `Ok(None)` if more bytes are needed.
fn parse_head(buf: &[u8]) -> std::result::Result<Option<(RequestHead, usize)>, String> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Request::new(&mut raw_headers);

    let len = match raw.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(format!("malformed request: {e}")),
    };

    let method = raw.method.ok_or("malformed request: missing method")?;
    let path = raw.path.ok_or("malformed request: missing path")?;
    let version = match raw.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut headers = HeaderMap::with_capacity(raw.headers.len());
    for header in raw.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| format!("malformed request: {e}"))?;
        let value =
            HeaderValue::from_bytes(header.value).map_err(|e| format!("malformed request: {e}"))?;
        headers.append(name, value);
    }

    Ok(Some((
        RequestHead {
            method: method.to_owned(),
            path: path.to_owned(),
            version,
            headers,
        },
        len,
    )))
}

// ============================================================================
// Handshake
// ============================================================================

/// Checks the upgrade request and serializes the `101` answer.
///
/// The method has already been checked; the error is the rejection detail.
fn switching_protocols(
    path: &str,
    version: Version,
    headers: HeaderMap,
) -> std::result::Result<Vec<u8>, String> {
    let mut request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .version(version)
        .body(())
        .map_err(|e| format!("malformed request: {e}"))?;
    *request.headers_mut() = headers;

    let response = create_response(&request).map_err(handshake_error)?;

    let mut buf = Vec::with_capacity(160);
    write_response(&mut buf, &response).map_err(handshake_error)?;
    Ok(buf)
}

/// Rejection detail for a failed handshake.
fn handshake_error(err: WsError) -> String {
    match err {
        WsError::Protocol(e) => e.to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Responses
// ============================================================================

async fn write_all_flush<S>(stream: &mut S, bytes: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(bytes).await?;
    stream.flush().await
}

/// Serializes the 503 answer sent on every rejection.
fn rejection_response(detail: &str) -> BytesMut {
    let body = format!("{UPGRADE_FAILED}{detail}");
    let mut buf = BytesMut::with_capacity(192 + body.len());

    buf.put(&b"HTTP/1.1 503 Service Unavailable\r\n"[..]);
    buf.put(&b"Content-Type: text/plain; charset=utf-8\r\n"[..]);
    buf.put(&b"X-Content-Type-Options: nosniff\r\n"[..]);
    buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    buf.put(&b"Connection: close\r\n\r\n"[..]);
    buf.put(body.as_bytes());
    buf
}

/// Writes the 503 answer and shuts the stream down. Failures are only logged.
async fn reject<S>(stream: &mut S, detail: &str)
where
    S: AsyncWrite + Unpin,
{
    let response = rejection_response(detail);
    let written = async {
        stream.write_all(&response).await?;
        stream.flush().await?;
        stream.shutdown().await
    }
    .await;

    if let Err(e) = written {
        warn!(error = %e, "Failed to write upgrade rejection");
    }
}

// ============================================================================
// Tests
// ============================================================================
