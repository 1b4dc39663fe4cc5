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

//! Wire types for the medialink event stream.
//!
//! The backend pushes JSON text frames shaped as `{"type": .., "data": ..}`.
//! This crate owns the envelope, the wildcard token used by subscribers, the
//! message kinds the backend is known to emit, and typed payloads for them.
//!
//! Layout: `envelope.rs` (envelope + decode), `kinds.rs` (kind constants),
//! `payloads.rs` (typed payloads), `error.rs` (decode errors).

pub mod envelope;
pub mod error;
pub mod kinds;
pub mod payloads;

pub use envelope::{InboundMessage, WILDCARD};
pub use error::{DecodeError, DecodeResult};
pub use payloads::{
    LinkProgress, LinkResult, LinkStatus, MediaEvent, RssMatch, RssMatchStatus, TorrentProgress,
    TorrentStatus,
};
