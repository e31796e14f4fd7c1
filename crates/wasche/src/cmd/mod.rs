use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use wasche_transport::serial::{DEFAULT_BAUD_RATE, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod history;
pub mod ingest;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the gateway link and keep machine status up to date.
    Ingest(IngestArgs),
    /// Decode a byte capture offline and print every packet.
    Decode(DecodeArgs),
    /// Show machine status from a journal.
    Status(StatusArgs),
    /// Show a machine's readings over a time window.
    History(HistoryArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ingest(args) => ingest::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::History(args) => history::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Serial device of the gateway.
    #[arg(long, env = "WASCHE_SERIAL_PORT", default_value = DEFAULT_PORT)]
    pub port: String,
    /// Replay a recorded byte capture instead of opening the serial device.
    /// Takes precedence over `--port`.
    #[arg(long, value_name = "FILE")]
    pub capture: Option<PathBuf>,
    /// Baud rate of the serial device.
    #[arg(long, env = "WASCHE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Journal file to persist readings and status into. Memory only if unset.
    #[arg(long, value_name = "FILE", env = "WASCHE_JOURNAL")]
    pub journal: Option<PathBuf>,
    /// Persistence queue capacity, in events.
    #[arg(long, default_value_t = 1024)]
    pub queue: usize,
    /// Wait for the store instead of dropping events when the queue is full.
    #[arg(long)]
    pub block_on_backlog: bool,
    /// Wait between attempts to open the link (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub reconnect_delay: String,
    /// Stop after this long instead of waiting for Ctrl-C (e.g. 30s).
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex bytes, whitespace or colon separated (e.g. "01 01 00 ...").
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Binary capture file.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Journal file written by `wasche ingest`.
    #[arg(long, value_name = "FILE", env = "WASCHE_JOURNAL")]
    pub journal: PathBuf,
    /// Show one node with its recent readings.
    pub node: Option<u16>,
    /// Number of recent readings shown for a single node.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Journal file written by `wasche ingest`.
    #[arg(long, value_name = "FILE", env = "WASCHE_JOURNAL")]
    pub journal: PathBuf,
    /// Node to show.
    pub node: u16,
    /// Size of the window, in hours back from now.
    #[arg(long, default_value_t = 24)]
    pub hours: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
