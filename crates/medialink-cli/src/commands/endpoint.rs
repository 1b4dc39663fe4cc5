use std::io::Write;

use anyhow::anyhow;
use medialink_stream::StreamConfig;

use crate::client::{CliError, CliResult};

pub(crate) fn handle_endpoint(config: &StreamConfig, out: &mut impl Write) -> CliResult<()> {
    writeln!(out, "{}", config.endpoint())
        .map_err(|err| CliError::failure(anyhow!("failed to write endpoint: {err}")))
}
