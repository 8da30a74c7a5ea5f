//! Transport configuration.
//!
//! [`TransportConfig`] is built once per transport and shared read-only by
//! every connection it produces.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use ws_transport::TransportConfig;
//!
//! let config = TransportConfig::default()
//!     .with_ping_interval(Duration::from_secs(10))
//!     .with_header("x-client", "demo")
//!     .unwrap();
//!
//! assert_eq!(config.keepalive_params().0, Duration::from_secs(10));
//! assert_eq!(config.buffer_size, 32 * 1024);
//! ```
//!
//! Deployments that keep settings in a file go through [`TransportSettings`]:
//!
//! ```
//! use ws_transport::TransportSettings;
//!
//! let settings = TransportSettings::from_json(r#"{ "ping_interval_ms": 5000 }"#).unwrap();
//! let config = settings.into_config().unwrap();
//! assert_eq!(config.ping_interval.as_millis(), 5000);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default interval between heartbeat pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default silence after which the peer is considered dead.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for a single receive.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for a single send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default read/write buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Largest accepted read/write buffer size in bytes.
pub const MAX_BUFFER_SIZE: usize = 16 << 20;

/// Default limit on one inbound message in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

// ============================================================================
// TransportParams
// ============================================================================

/// Overrides accepted by [`TransportConfig::with_params`].
#[derive(Debug, Clone, Default)]
pub struct TransportParams {
    /// Extra headers sent with the client handshake.
    pub headers: Option<HeaderMap>,
}

// ============================================================================
// TransportConfig
// ============================================================================

/// Immutable transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Cadence reported to the heartbeat coordinator.
    pub ping_interval: Duration,

    /// Max silence before the coordinator declares the peer dead.
    pub ping_timeout: Duration,

    /// Deadline applied to each receive.
    pub receive_timeout: Duration,

    /// Deadline applied to each send.
    pub send_timeout: Duration,

    /// Read and write buffer size in bytes.
    pub buffer_size: usize,

    /// Largest inbound message; anything bigger fails with `BadBuffer`.
    pub max_message_size: usize,

    /// Extra headers attached to the outbound client handshake.
    pub headers: Option<HeaderMap>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            headers: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl TransportConfig {
    /// Default configuration with the given overrides applied.
    ///
    /// Only `headers` can be overridden this way; every other field keeps its
    /// default.
    #[must_use]
    pub fn with_params(params: TransportParams) -> Self {
        Self {
            headers: params.headers,
            ..Self::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl TransportConfig {
    /// Sets the ping interval.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the ping timeout.
    #[inline]
    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Sets the per-receive deadline.
    #[inline]
    #[must_use]
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Sets the per-send deadline.
    #[inline]
    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the read/write buffer size.
    #[inline]
    #[must_use]
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Sets the inbound message size limit.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Appends an extra handshake header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .append(name, value);
        Ok(self)
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl TransportConfig {
    /// Returns `(ping_interval, ping_timeout)`.
    #[inline]
    #[must_use]
    pub const fn keepalive_params(&self) -> (Duration, Duration) {
        (self.ping_interval, self.ping_timeout)
    }

    /// WebSocket protocol settings derived from this configuration.
    ///
    /// Sizes outside the range [`validate`](Self::validate) accepts are
    /// clamped into it.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        let buffer_size = self.buffer_size.clamp(1, MAX_BUFFER_SIZE);
        let max_message_size = self.max_message_size.max(1);
        let defaults = WebSocketConfig::default();
        let max_frame_size = defaults
            .max_frame_size
            .map_or(max_message_size, |frame| frame.min(max_message_size));

        defaults
            .read_buffer_size(buffer_size)
            .write_buffer_size(buffer_size)
            .max_message_size(Some(max_message_size))
            .max_frame_size(Some(max_frame_size))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout is zero, the buffer size is
    /// zero or above [`MAX_BUFFER_SIZE`], or the message size limit is zero
    /// or smaller than the buffer.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("ping_interval", self.ping_interval),
            ("ping_timeout", self.ping_timeout),
            ("receive_timeout", self.receive_timeout),
            ("send_timeout", self.send_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::config(format!("{name} must be greater than zero")));
        }
        if self.buffer_size == 0 {
            return Err(Error::config("buffer_size must be greater than zero"));
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            return Err(Error::config(format!("buffer_size must be at most {MAX_BUFFER_SIZE} bytes")));
        }
        if self.max_message_size < self.buffer_size {
            return Err(Error::config("max_message_size must be at least buffer_size"));
        }
        Ok(())
    }
}

// ============================================================================
// TransportSettings
// ============================================================================

/// Serializable form of [`TransportConfig`].
///
/// Durations are in milliseconds. Missing fields take the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings {
    pub ping_interval_ms: Option<u64>,
    pub ping_timeout_ms: Option<u64>,
    pub receive_timeout_ms: Option<u64>,
    pub send_timeout_ms: Option<u64>,
    pub buffer_size: Option<usize>,
    pub max_message_size: Option<usize>,
    pub headers: BTreeMap<String, String>,
}

impl TransportSettings {
    /// Parses settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document does not match.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds and validates a [`TransportConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on an invalid header or a value
    /// [`TransportConfig::validate`] rejects.
    pub fn into_config(self) -> Result<TransportConfig> {
        let defaults = TransportConfig::default();
        let millis = |value: Option<u64>, default: Duration| {
            value.map_or(default, Duration::from_millis)
        };

        let mut config = TransportConfig {
            ping_interval: millis(self.ping_interval_ms, defaults.ping_interval),
            ping_timeout: millis(self.ping_timeout_ms, defaults.ping_timeout),
            receive_timeout: millis(self.receive_timeout_ms, defaults.receive_timeout),
            send_timeout: millis(self.send_timeout_ms, defaults.send_timeout),
            buffer_size: self.buffer_size.unwrap_or(defaults.buffer_size),
            max_message_size: self.max_message_size.unwrap_or(defaults.max_message_size),
            headers: None,
        };

        for (name, value) in &self.headers {
            config = config.with_header(name, value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::config(format!("invalid value for header {name:?}: {e}")))?;
    Ok((header_name, header_value))
}

// ============================================================================
// Tests
// ============================================================================
