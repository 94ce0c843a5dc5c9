use std::io::IsTerminal as _;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, error::ErrorKind};
use tracing::error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use wsbench::cli::Args;
use wsbench::{Error, LogProgress, WsConnector, run, summarize};

/// Logs go to stderr so the report on stdout stays machine-readable.
/// `RUST_LOG` overrides the level picked by `--verbose`.
fn init_tracing(verbose: bool) {
    let directive = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let _ = tracing_subscriber::fmt()
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(directive.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let json = args.json;

    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            let kind = match err {
                Error::Io(_) => ErrorKind::Io,
                _ => ErrorKind::ValueValidation,
            };
            Args::command().error(kind, err.to_string()).exit()
        }
    };
    let report_config = config.clone();

    let result = match run(config, Arc::new(WsConnector::new()), LogProgress).await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "Benchmark aborted");
            return ExitCode::FAILURE;
        }
    };

    let summary = summarize(&result, &report_config);
    if json {
        match summary.to_json() {
            Ok(out) => println!("{out}"),
            Err(err) => {
                error!(error = %err, "Failed to serialize summary");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{summary}");
    }

    if summary.latency.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
