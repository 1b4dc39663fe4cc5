//! Error types, exit codes, and configuration helpers for the CLI.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use medialink_stream::StreamConfig;
use medialink_telemetry::{LoggingConfig, build_sha, init_logging, log_format_from_str};

use crate::cli::Cli;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl Error for CliError {}

/// Build the stream configuration from global flags.
pub(crate) fn stream_config(cli: &Cli) -> CliResult<StreamConfig> {
    build_stream_config(&cli.origin, cli.reconnect_ms)
}

fn build_stream_config(origin: &str, reconnect_ms: u64) -> CliResult<StreamConfig> {
    let config = StreamConfig::new(origin.trim()).map_err(|err| {
        CliError::validation(format!("invalid origin '{origin}': {}", error_chain(&err)))
    })?;
    Ok(config.with_reconnect_delay(Duration::from_millis(reconnect_ms)))
}

/// Install the global subscriber from the logging flags.
pub(crate) fn init_telemetry(cli: &Cli) -> CliResult<()> {
    let format = log_format_from_str(&cli.log_format).map_err(|_| {
        CliError::validation(format!(
            "unknown log format '{}'; expected json, pretty, or auto",
            cli.log_format
        ))
    })?;
    let config = LoggingConfig {
        level: &cli.log_level,
        format,
        build_sha: option_env!("MEDIALINK_BUILD_SHA").unwrap_or_else(build_sha),
    };
    init_logging(&config).map_err(|err| {
        CliError::failure(anyhow::Error::new(err).context("failed to initialise logging"))
    })
}

fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn exit_codes_distinguish_validation_and_failure() {
        let validation = CliError::validation("bad origin");
        assert_eq!(validation.exit_code(), 2);
        assert_eq!(validation.display_message(), "bad origin");

        let failure = CliError::failure(anyhow!("socket closed").context("tail failed"));
        assert_eq!(failure.exit_code(), 3);
        assert_eq!(failure.display_message(), "tail failed: socket closed");
    }

    #[test]
    fn stream_config_applies_reconnect_delay() {
        let config = build_stream_config(" https://media.example.net:8443 ", 250)
            .expect("origin should parse");
        assert_eq!(
            config.endpoint().as_str(),
            "wss://media.example.net:8443/api/ws"
        );
        assert_eq!(config.reconnect_delay(), Duration::from_millis(250));
    }

    #[test]
    fn invalid_origin_is_a_validation_error() {
        let err = build_stream_config("ftp://media.example.net", 3_000)
            .expect_err("ftp origins are rejected");
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().starts_with("invalid origin 'ftp://media.example.net'"));

        let err = build_stream_config("not a url", 3_000).expect_err("garbage is rejected");
        assert_eq!(err.exit_code(), 2);
    }
}
