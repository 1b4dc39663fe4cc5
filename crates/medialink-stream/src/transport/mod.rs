//! Transport seam between the client lifecycle and the wire.
//!
//! # Design
//! - `Connector` opens one transport per connection attempt.
//! - `Transport` yields frames until the peer closes or the read fails.
//! - Implementations never reconnect on their own; the client owns that policy.

mod websocket;

use std::error::Error;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use websocket::{DEFAULT_CONNECT_TIMEOUT, WebSocketConnector};

/// Frame read from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

/// Failures raised by transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("transport connection failed")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The connection attempt did not finish in time.
    #[error("transport connection timed out")]
    ConnectTimeout {
        /// Endpoint that was dialled.
        endpoint: String,
    },
    /// Reading from an open connection failed.
    #[error("transport read failed")]
    Read {
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl TransportError {
    /// Build a connect failure for `endpoint`.
    pub fn connect(endpoint: &Url, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            source: source.into(),
        }
    }

    /// Build a read failure.
    pub fn read(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Read {
            source: source.into(),
        }
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Opens transports to the stream endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport to `endpoint`.
    async fn open(&self, endpoint: &Url) -> TransportResult<Box<dyn Transport>>;
}

/// An open, receive-only connection.
#[async_trait]
pub trait Transport: Send {
    /// Next frame; `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<TransportResult<Frame>>;

    /// Close the connection. Safe to call on an already closed transport.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_keep_constant_messages() {
        let endpoint = Url::parse("ws://127.0.0.1:1/api/ws").expect("url");
        let err = TransportError::connect(&endpoint, "refused");
        assert_eq!(err.to_string(), "transport connection failed");
        assert!(matches!(
            err,
            TransportError::Connect { endpoint, .. } if endpoint == "ws://127.0.0.1:1/api/ws"
        ));
        assert_eq!(
            TransportError::read("reset").to_string(),
            "transport read failed"
        );
    }
}
