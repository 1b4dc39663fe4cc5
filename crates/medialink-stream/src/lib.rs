#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Real-time event client for the medialink backend.
//!
//! [`EventStreamClient`] owns a single connection to `/api/ws`, reconnects
//! after a fixed delay when the connection drops, decodes inbound frames, and
//! fans them out to subscribers keyed by message kind (plus wildcard
//! subscribers). Consumers read the connection state and the last decoded
//! message through `tokio::sync::watch` receivers.
//!
//! Layout: `client.rs` (lifecycle + dispatch), `registry.rs` (listeners and
//! subscriptions), `state.rs` (connection state), `config.rs` (endpoint
//! derivation), `transport/` (transport seam and WebSocket implementation).

pub mod client;
pub mod config;
pub mod registry;
pub mod state;
pub mod transport;

pub use client::EventStreamClient;
pub use config::{ConfigError, ConfigResult, StreamConfig};
pub use medialink_events::{InboundMessage, WILDCARD};
pub use registry::{Handler, Subscription};
pub use state::ConnectionState;
pub use transport::{
    Connector, Frame, Transport, TransportError, TransportResult, WebSocketConnector,
};
