//! Error types for the WebSocket transport.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//! Every error surfaces immediately; nothing here is retried. Reconnect and
//! backoff policy belong to the orchestrating layer.
//!
//! # Error Categories
//!
//! | [`ErrorKind`] | Variants |
//! |---------------|----------|
//! | Protocol | [`Error::BinaryMessage`], [`Error::PacketWrong`] |
//! | Payload | [`Error::BadBuffer`] |
//! | Upgrade | [`Error::MethodNotAllowed`], [`Error::HttpUpgradeFailed`] |
//! | Configuration | [`Error::Config`], [`Error::Json`] |
//! | Transport (pass-through) | [`Error::Io`], [`Error::WebSocket`], [`Error::Url`], [`Error::ConnectionClosed`] |
//!
//! Pass-through errors are returned exactly as the socket layer produced
//! them. Callers that need to tell a deadline from a reset inspect the cause,
//! e.g. with [`Error::is_timeout`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ErrorKind
// ============================================================================

/// Stable classification of an [`enum@Error`].
///
/// Match on this instead of on the concrete variant when only the category
/// matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A non-text frame was received.
    BinaryMessage,
    /// A frame payload could not be materialized.
    BadBuffer,
    /// A text frame decoded to an empty payload.
    PacketWrong,
    /// An upgrade was attempted with a method other than `GET`.
    MethodNotAllowed,
    /// Upgrade negotiation failed.
    HttpUpgradeFailed,
    /// Invalid transport configuration.
    Config,
    /// Unmodified error from the socket or handshake layer.
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BinaryMessage => "binary message",
            Self::BadBuffer => "bad buffer",
            Self::PacketWrong => "packet wrong",
            Self::MethodNotAllowed => "method not allowed",
            Self::HttpUpgradeFailed => "http upgrade failed",
            Self::Config => "config",
            Self::Transport => "transport",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Binary frame received.
    ///
    /// Only text frames carry messages. The connection stays usable.
    #[error("Binary messages are not supported")]
    BinaryMessage,

    /// Frame payload could not be buffered or decoded.
    #[error("Buffer error")]
    BadBuffer {
        /// What went wrong while reading the payload.
        #[source]
        source: WsError,
    },

    /// Text frame with an empty payload.
    #[error("Wrong packet type error")]
    PacketWrong,

    // ========================================================================
    // Upgrade Errors
    // ========================================================================
    /// Upgrade request used a method other than `GET`.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Upgrade negotiation failed.
    ///
    /// The peer has already been answered with a 503.
    #[error("Http upgrade failed: {reason}")]
    HttpUpgradeFailed {
        /// Why the handshake was rejected.
        reason: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Settings could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Pass-through Errors
    // ========================================================================
    /// Connection is closed, locally or by the peer.
    #[error("Connection closed")]
    ConnectionClosed,

    /// IO error, including deadline expiry.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket protocol or handshake error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] WsError),

    /// Dial address could not be parsed.
    #[error("Invalid address: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<WsError> for Error {
    /// Lifts socket-level failures out of the tungstenite wrapper so that
    /// an IO error stays an IO error.
    fn from(err: WsError) -> Self {
        match err {
            WsError::Io(e) => Self::Io(e),
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(other),
        }
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a bad buffer error.
    #[inline]
    pub fn bad_buffer(source: WsError) -> Self {
        Self::BadBuffer { source }
    }

    /// Creates an upgrade failure.
    #[inline]
    pub fn upgrade_failed(reason: impl Into<String>) -> Self {
        Self::HttpUpgradeFailed {
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates the IO error reported when a read or write deadline passes.
    #[inline]
    pub fn deadline_exceeded(operation: &str, after: Duration) -> Self {
        Self::Io(IoError::new(
            IoErrorKind::TimedOut,
            format!("{operation} deadline exceeded after {}ms", after.as_millis()),
        ))
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the stable category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BinaryMessage => ErrorKind::BinaryMessage,
            Self::BadBuffer { .. } => ErrorKind::BadBuffer,
            Self::PacketWrong => ErrorKind::PacketWrong,
            Self::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            Self::HttpUpgradeFailed { .. } => ErrorKind::HttpUpgradeFailed,
            Self::Config { .. } | Self::Json(_) => ErrorKind::Config,
            Self::ConnectionClosed | Self::Io(_) | Self::WebSocket(_) | Self::Url(_) => {
                ErrorKind::Transport
            }
        }
    }

    /// Returns `true` if a read or write deadline expired.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == IoErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Returns `true` if the peer violated the message framing rules.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::BinaryMessage | Self::PacketWrong)
    }

    /// Returns `true` if the upgrade was refused.
    #[inline]
    #[must_use]
    pub fn is_upgrade_error(&self) -> bool {
        matches!(self, Self::MethodNotAllowed | Self::HttpUpgradeFailed { .. })
    }

    /// Returns `true` if the connection can no longer carry messages.
    #[inline]
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                IoErrorKind::ConnectionReset
                    | IoErrorKind::ConnectionAborted
                    | IoErrorKind::BrokenPipe
                    | IoErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
