//! Stream endpoint configuration.
//!
//! # Design
//! - The endpoint is derived from the origin that serves the management UI.
//! - The stream scheme mirrors the origin scheme (`https` -> `wss`), never downgrading.
//! - Environment loading is a thin layer over the typed constructor.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Path of the event stream on the backend.
pub const STREAM_PATH: &str = "/api/ws";
/// Delay between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
/// Origin used when none is configured.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";
/// Environment variable holding the UI origin.
pub const ENV_ORIGIN: &str = "MEDIALINK_ORIGIN";
/// Environment variable holding the reconnect delay in milliseconds.
pub const ENV_RECONNECT_DELAY_MS: &str = "MEDIALINK_RECONNECT_DELAY_MS";

/// Errors raised while building a [`StreamConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The origin could not be parsed as a URL.
    #[error("origin is not a valid URL")]
    InvalidOrigin {
        /// Raw origin value.
        value: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// The origin scheme has no stream counterpart.
    #[error("origin scheme is not supported")]
    UnsupportedScheme {
        /// Offending scheme.
        scheme: String,
    },
    /// The origin carries no host.
    #[error("origin has no host")]
    MissingHost {
        /// Raw origin value.
        value: String,
    },
    /// The reconnect delay was not a whole number of milliseconds.
    #[error("reconnect delay is not a valid millisecond count")]
    InvalidDelay {
        /// Raw delay value.
        value: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for an [`crate::EventStreamClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    origin: Url,
    endpoint: Url,
    reconnect_delay: Duration,
}

impl StreamConfig {
    /// Build a configuration for the given UI origin (e.g. `https://media.lan`).
    ///
    /// # Errors
    ///
    /// Returns an error when the origin is not a URL, has no host, or uses a
    /// scheme other than `http`, `https`, `ws`, or `wss`.
    pub fn new(origin: &str) -> ConfigResult<Self> {
        let origin = Url::parse(origin).map_err(|source| ConfigError::InvalidOrigin {
            value: origin.to_string(),
            source,
        })?;
        let endpoint = stream_endpoint(&origin)?;
        Ok(Self {
            origin,
            endpoint,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        })
    }

    /// Load `MEDIALINK_ORIGIN` and `MEDIALINK_RECONNECT_DELAY_MS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when either variable holds an invalid value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_values(
            env::var(ENV_ORIGIN).ok().as_deref(),
            env::var(ENV_RECONNECT_DELAY_MS).ok().as_deref(),
        )
    }

    fn from_values(origin: Option<&str>, delay_ms: Option<&str>) -> ConfigResult<Self> {
        let origin = origin.map(str::trim).filter(|value| !value.is_empty());
        let config = Self::new(origin.unwrap_or(DEFAULT_ORIGIN))?;
        match delay_ms.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => {
                let millis = raw
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidDelay {
                        value: raw.to_string(),
                    })?;
                Ok(config.with_reconnect_delay(Duration::from_millis(millis)))
            }
            None => Ok(config),
        }
    }

    /// Override the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Origin the endpoint was derived from.
    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    /// Stream endpoint, e.g. `wss://media.lan/api/ws`.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fixed delay before each reconnect attempt.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

/// Derive `<ws|wss>://<host[:port]>/api/ws` from a UI origin.
///
/// # Errors
///
/// Returns an error for origins without a host or with an unsupported scheme.
pub fn stream_endpoint(origin: &Url) -> ConfigResult<Url> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    };
    let host = origin
        .host_str()
        .ok_or_else(|| ConfigError::MissingHost {
            value: origin.to_string(),
        })?;
    let authority = origin
        .port()
        .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
    let raw = format!("{scheme}://{authority}{STREAM_PATH}");
    Url::parse(&raw).map_err(|source| ConfigError::InvalidOrigin { value: raw, source })
}
