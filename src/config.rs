//! Run configuration.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::target::Target;

/// Request body sent when none is configured.
pub const DEFAULT_PAYLOAD: &[u8] =
    br#"{"service": "echo", "method": "Echo", "EchoRequest": {"name":"tester"}}"#;

/// Capacity of the worker → aggregator sample channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Message framing used for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Text frames (payload must be valid UTF-8 for strict servers).
    #[default]
    Text,
    /// Binary frames.
    Binary,
}

/// What a worker does when it cannot open a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectFailurePolicy {
    /// Count the cycle as failed and carry on.
    #[default]
    Record,
    /// Abort the whole run, discarding collected statistics.
    Abort,
}

/// How cycles left over by `requests / concurrency` are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderPolicy {
    /// Worker 0 runs the whole remainder.
    #[default]
    FirstWorker,
    /// Workers `0..remainder` run one extra cycle each.
    RoundRobin,
}

/// Immutable benchmark configuration, shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Endpoint under test.
    pub target: Target,

    /// Total number of request cycles across all workers.
    pub total_requests: usize,

    /// Number of concurrent workers.
    ///
    /// Must not exceed `total_requests`.
    pub concurrency: usize,

    /// Reuse one connection per worker instead of one per cycle.
    ///
    /// Default: true
    pub keep_alive: bool,

    /// Frame type for requests.
    ///
    /// Default: [`Encoding::Text`]
    pub encoding: Encoding,

    /// Request body used for every cycle.
    pub payload: Bytes,

    /// Sample channel capacity; full channels block workers.
    ///
    /// Default: 1000
    pub channel_capacity: usize,

    /// Deadline for each open/send/receive operation.
    ///
    /// `None` waits forever, so a stuck peer stalls the run.
    /// Default: None
    pub op_timeout: Option<Duration>,

    /// Default: [`ConnectFailurePolicy::Record`]
    pub connect_failure: ConnectFailurePolicy,

    /// Default: [`RemainderPolicy::FirstWorker`]
    pub remainder: RemainderPolicy,
}

impl RunConfig {
    /// Create a configuration with default options.
    #[must_use]
    pub fn new(target: Target, total_requests: usize, concurrency: usize) -> Self {
        Self {
            target,
            total_requests,
            concurrency,
            keep_alive: true,
            encoding: Encoding::default(),
            payload: Bytes::from_static(DEFAULT_PAYLOAD),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            op_timeout: None,
            connect_failure: ConnectFailurePolicy::default(),
            remainder: RemainderPolicy::default(),
        }
    }

    /// Enable or disable connection reuse.
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set request framing.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the sample channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set a per-operation deadline.
    #[must_use]
    pub const fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    /// Set the connect failure policy.
    #[must_use]
    pub const fn with_connect_failure(mut self, policy: ConnectFailurePolicy) -> Self {
        self.connect_failure = policy;
        self
    }

    /// Set the remainder distribution policy.
    #[must_use]
    pub const fn with_remainder(mut self, policy: RemainderPolicy) -> Self {
        self.remainder = policy;
        self
    }

    /// Check the configuration before any worker is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the request count, concurrency or
    /// channel capacity is zero, or if concurrency exceeds the request count.
    pub fn validate(&self) -> Result<()> {
        if self.total_requests == 0 {
            return Err(Error::InvalidConfig(
                "number of requests must be greater than zero".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "concurrency level must be greater than zero".into(),
            ));
        }
        if self.concurrency > self.total_requests {
            return Err(Error::InvalidConfig(format!(
                "cannot use concurrency level {} greater than total number of requests {}",
                self.concurrency, self.total_requests
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::InvalidConfig(
                "channel capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::parse("ws://127.0.0.1:9001/").unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = RunConfig::new(target(), 100, 10);
        assert!(config.keep_alive);
        assert_eq!(config.encoding, Encoding::Text);
        assert_eq!(config.payload.as_ref(), DEFAULT_PAYLOAD);
        assert_eq!(config.channel_capacity, 1000);
        assert!(config.op_timeout.is_none());
        assert_eq!(config.connect_failure, ConnectFailurePolicy::Record);
        assert_eq!(config.remainder, RemainderPolicy::FirstWorker);
    }

    #[test]
    fn test_config_builder() {
        let config = RunConfig::new(target(), 100, 10)
            .with_keep_alive(false)
            .with_encoding(Encoding::Binary)
            .with_payload(vec![1, 2, 3])
            .with_op_timeout(Duration::from_secs(2))
            .with_remainder(RemainderPolicy::RoundRobin);

        assert!(!config.keep_alive);
        assert_eq!(config.encoding, Encoding::Binary);
        assert_eq!(config.payload.as_ref(), &[1, 2, 3]);
        assert_eq!(config.op_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.remainder, RemainderPolicy::RoundRobin);
    }

    #[test]
    fn test_validate_accepts_equal_concurrency() {
        assert!(RunConfig::new(target(), 5, 5).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_concurrency_above_requests() {
        let err = RunConfig::new(target(), 5, 6).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_zero_requests() {
        assert!(RunConfig::new(target(), 0, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        assert!(RunConfig::new(target(), 10, 0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = RunConfig::new(target(), 10, 1).with_channel_capacity(0);
        assert!(config.validate().is_err());
    }
}
