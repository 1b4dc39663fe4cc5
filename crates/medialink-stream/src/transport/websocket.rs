//! WebSocket transport backed by `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use super::{Connector, Frame, Transport, TransportError, TransportResult};

/// Upper bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Production connector dialling the backend over `ws`/`wss`.
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Connector with a custom handshake timeout.
    #[must_use]
    pub const fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &Url) -> TransportResult<Box<dyn Transport>> {
        let handshake = connect_async(endpoint.as_str());
        let (stream, response) = timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                endpoint: endpoint.to_string(),
            })?
            .map_err(|err| TransportError::connect(endpoint, err))?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn next_frame(&mut self) -> Option<TransportResult<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(TransportError::read(err))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    debug!(?frame, "websocket close frame received");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("websocket control frame");
                }
            }
        }
    }

    async fn close(&mut self) {
        match timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "websocket close returned an error"),
            Err(_) => debug!("websocket close timed out"),
        }
    }
}
