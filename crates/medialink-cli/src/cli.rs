//! Argument parsing and command dispatch.

use std::io;

use clap::{Args, Parser, Subcommand};
use medialink_stream::config::{DEFAULT_ORIGIN, ENV_ORIGIN, ENV_RECONNECT_DELAY_MS};
use medialink_telemetry::{DEFAULT_LOG_LEVEL, GlobalContextGuard};

use crate::client::{CliResult, init_telemetry, stream_config};
use crate::commands::endpoint::handle_endpoint;
use crate::commands::tail::handle_tail;
use crate::output::TailFormat;

const DEFAULT_RECONNECT_MS: u64 = 3_000;

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    if let Err(err) = init_telemetry(&cli) {
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }
    let _context = GlobalContextGuard::new(command_label(&cli.command));

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = stream_config(&cli)?;
    match cli.command {
        Command::Endpoint => handle_endpoint(&config, &mut io::stdout().lock()),
        Command::Tail(args) => handle_tail(config, args, io::stdout()).await,
    }
}

#[derive(Parser)]
#[command(
    name = "medialink",
    about = "Follow the medialink backend event stream"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = ENV_ORIGIN,
        default_value = DEFAULT_ORIGIN,
        help = "Backend origin the stream endpoint is derived from"
    )]
    pub(crate) origin: String,
    #[arg(
        long = "reconnect-ms",
        global = true,
        env = ENV_RECONNECT_DELAY_MS,
        default_value_t = DEFAULT_RECONNECT_MS,
        help = "Milliseconds to wait before reconnecting"
    )]
    pub(crate) reconnect_ms: u64,
    #[arg(
        long,
        global = true,
        env = "MEDIALINK_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(
        long,
        global = true,
        env = "MEDIALINK_LOG_FORMAT",
        default_value = "auto",
        help = "Log format: json, pretty, or auto"
    )]
    pub(crate) log_format: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Stream events to stdout until interrupted.
    Tail(TailArgs),
    /// Print the derived stream endpoint.
    Endpoint,
}

#[derive(Args, Default)]
pub(crate) struct TailArgs {
    #[arg(
        long,
        value_delimiter = ',',
        help = "Message kinds to follow (all kinds when omitted)"
    )]
    pub(crate) event: Vec<String>,
    #[arg(long, conflicts_with = "summary", help = "Pretty-print each envelope")]
    pub(crate) pretty: bool,
    #[arg(long, help = "Print one human-readable line per event")]
    pub(crate) summary: bool,
    #[arg(long, help = "Exit after printing this many events")]
    pub(crate) limit: Option<usize>,
}

impl TailArgs {
    pub(crate) const fn format(&self) -> TailFormat {
        if self.summary {
            TailFormat::Summary
        } else if self.pretty {
            TailFormat::Pretty
        } else {
            TailFormat::Json
        }
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Tail(_) => "tail",
        Command::Endpoint => "endpoint",
    }
}
