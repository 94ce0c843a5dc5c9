//! Error types for the load-testing engine and its WebSocket transport.
//!
//! Transport errors raised during a cycle are folded into failed samples by
//! the worker; only configuration problems, fail-fast connect aborts and
//! broken internal plumbing ever reach the caller of [`crate::run`].

use thiserror::Error;

use crate::sample::Phase;

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a benchmark.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Run configuration rejected before any worker starts.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint address could not be parsed or is unsupported.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The server answered the upgrade request incorrectly.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Malformed frame received from the server.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The peer closed the connection.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A connection operation exceeded the configured deadline.
    #[error("{0} timed out")]
    Timeout(Phase),

    /// Connection establishment failed under the fail-fast policy.
    #[error("{{{worker}-{cycle}}} dial error: {reason}")]
    ConnectAborted {
        /// Index of the worker that failed.
        worker: usize,
        /// Cycle index within that worker.
        cycle: usize,
        /// Underlying transport error.
        reason: String,
    },

    /// Every request failed, so no latency figures exist.
    #[error("No successful requests: latency statistics unavailable")]
    NoSuccessfulRequests,

    /// The sample channel closed before the run finished.
    #[error("Sample channel closed before all samples were delivered")]
    ChannelClosed,

    /// A worker or aggregator task panicked or was cancelled.
    #[error("Task failed: {0}")]
    WorkerFailed(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::WorkerFailed(err.to_string())
    }
}
