//! Command-line arguments for the `wsb` binary.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::{ArgAction, Parser};

use crate::config::{ConnectFailurePolicy, Encoding, RemainderPolicy, RunConfig};
use crate::error::{Error, Result};
use crate::target::Target;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";
pub const DEFAULT_REQUESTS: usize = 1_000_000;
pub const DEFAULT_CONCURRENCY: usize = 1000;

/// WebSocket round-trip benchmark in the style of ApacheBench.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsb", version, about)]
pub struct Args {
    /// Endpoint to benchmark: [ws://]hostname[:port]/path
    #[arg(short, long, default_value = DEFAULT_URL)]
    pub url: String,

    /// Number of requests to perform
    #[arg(short = 'n', long, default_value_t = DEFAULT_REQUESTS)]
    pub requests: usize,

    /// Number of requests to run concurrently
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Reuse one connection per worker
    #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
    pub keep_alive: bool,

    /// Send binary frames instead of text frames
    #[arg(short, long)]
    pub binary: bool,

    /// Request body
    #[arg(short, long, conflicts_with = "payload_file")]
    pub payload: Option<String>,

    /// Read the request body from a file
    #[arg(long)]
    pub payload_file: Option<PathBuf>,

    /// Per-operation deadline, e.g. "5s" or "250ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Capacity of the sample channel between workers and the aggregator
    #[arg(long, default_value_t = crate::config::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Abort the whole run on the first connection failure
    #[arg(long)]
    pub abort_on_connect_error: bool,

    /// Spread leftover requests over the first workers instead of worker 0
    #[arg(long)]
    pub round_robin: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build and validate the run configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTarget`] for a bad or empty URL
    /// - [`Error::InvalidConfig`] for inconsistent counts
    /// - [`Error::Io`] if the payload file cannot be read
    pub fn into_config(self) -> Result<RunConfig> {
        let target = Target::parse(&self.url)?;

        let mut config = RunConfig::new(target, self.requests, self.concurrency)
            .with_keep_alive(self.keep_alive)
            .with_channel_capacity(self.channel_capacity);

        if self.binary {
            config = config.with_encoding(Encoding::Binary);
        }
        if let Some(payload) = self.payload {
            config = config.with_payload(payload);
        } else if let Some(path) = &self.payload_file {
            let body = std::fs::read(path)
                .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
            config = config.with_payload(Bytes::from(body));
        }
        if let Some(timeout) = self.timeout {
            config = config.with_op_timeout(timeout);
        }
        if self.abort_on_connect_error {
            config = config.with_connect_failure(ConnectFailurePolicy::Abort);
        }
        if self.round_robin {
            config = config.with_remainder(RemainderPolicy::RoundRobin);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("wsb").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.url, DEFAULT_URL);
        assert_eq!(args.requests, 1_000_000);
        assert_eq!(args.concurrency, 1000);
        assert!(args.keep_alive);
        assert!(!args.binary);
    }

    #[test]
    fn test_into_config() {
        let config = parse(&[
            "-u", "localhost:9001/echo", "-n", "100", "-c", "8", "-k", "false", "-b",
            "-p", "hello", "--timeout", "250ms", "--round-robin",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.target.as_str(), "ws://localhost:9001/echo");
        assert_eq!(config.total_requests, 100);
        assert_eq!(config.concurrency, 8);
        assert!(!config.keep_alive);
        assert_eq!(config.encoding, Encoding::Binary);
        assert_eq!(config.payload.as_ref(), b"hello");
        assert_eq!(config.op_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.remainder, RemainderPolicy::RoundRobin);
    }

    #[test]
    fn test_concurrency_above_requests_is_rejected() {
        let err = parse(&["-n", "5", "-c", "10"]).into_config().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_requests_is_rejected() {
        assert!(parse(&["-n", "0", "-c", "0"]).into_config().is_err());
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let err = parse(&["-u", "", "-n", "1", "-c", "1"]).into_config().unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
    }

    #[test]
    fn test_payload_conflicts_with_file() {
        let result = Args::try_parse_from(["wsb", "-p", "x", "--payload-file", "body.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_payload_file() {
        let err = parse(&["--payload-file", "/nonexistent/body.json", "-n", "1", "-c", "1"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
