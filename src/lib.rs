//! # wsbench - Concurrent WebSocket round-trip load tester
//!
//! `wsbench` drives many concurrent virtual clients against a WebSocket
//! endpoint. Each client performs connect/send/receive cycles, and the
//! results are summarized ApacheBench style.
//!
//! ## Features
//!
//! - **Contention-free aggregation**: workers hand samples to a single
//!   aggregator over a bounded channel
//! - **Exact accounting**: one sample per attempted cycle, counted once
//! - **Nearest-rank percentiles** with a fixed 50..100 ladder
//! - **Pluggable transport** through the [`Connector`] trait
//! - **Text and JSON reports**
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsbench::{LogProgress, RunConfig, Target, WsConnector, run, summarize};
//!
//! # async fn example() -> wsbench::Result<()> {
//! let target = Target::parse("ws://127.0.0.1:8080/ws")?;
//! let config = RunConfig::new(target, 10_000, 50);
//! let result = run(config.clone(), Arc::new(WsConnector::new()), LogProgress).await?;
//! println!("{}", summarize(&result, &config));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod sample;
pub mod stats;
pub mod target;
pub mod transport;

pub use config::{ConnectFailurePolicy, Encoding, RemainderPolicy, RunConfig};
pub use engine::{LogProgress, NoProgress, Progress, RunResult, partition, run};
pub use error::{Error, Result};
pub use sample::{Outcome, Phase, Sample};
pub use stats::{Latency, PhaseStats, Summary, summarize};
pub use target::Target;
pub use transport::{Connector, WsConnection, WsConnector};
