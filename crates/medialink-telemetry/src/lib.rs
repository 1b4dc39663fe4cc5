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

//! Logging setup shared by the medialink binaries.
//!
//! Library crates only emit `tracing` events; binaries call [`init_logging`]
//! once at startup to decide where and how those events are rendered.

pub mod context;
pub mod error;
pub mod init;

pub use context::GlobalContextGuard;
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_str,
};
