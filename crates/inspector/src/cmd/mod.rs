use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod listen;
pub mod schema;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the domains, commands, and events of a protocol description.
    Schema(SchemaArgs),
    /// Invoke one command on an endpoint and print its result.
    Call(CallArgs),
    /// Connect to an endpoint and print the events it emits.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Schema(args) => schema::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Protocol description file, or a directory of `*.protocol.json` files.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Endpoint socket path.
    pub endpoint: PathBuf,
    /// Command to invoke, as `Domain.command`.
    pub method: String,
    /// Positional arguments as JSON; bare words are sent as strings and
    /// `undefined` leaves a slot empty.
    pub args: Vec<String>,
    /// Protocol description file or directory.
    #[arg(long, env = "INSPECTOR_SCHEMA", value_name = "PATH")]
    pub schema: PathBuf,
    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Refuse to send when a required argument is missing.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint socket path.
    pub endpoint: PathBuf,
    /// Only print these events (comma-separated `Domain.event`).
    #[arg(long, value_delimiter = ',')]
    pub events: Option<Vec<String>>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Single-threaded runtime for one command invocation.
pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", &err))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("  ").is_err());
    }
}
