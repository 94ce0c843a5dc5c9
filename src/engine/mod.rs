//! The load-generation engine.
//!
//! ```text
//!  worker 0 ─┐
//!  worker 1 ─┼──► bounded channel ──► aggregator ──► RunResult
//!  worker N ─┘
//! ```
//!
//! Workers share a read-only [`RunConfig`] and push one [`Sample`] per cycle
//! into a bounded channel. A single aggregator task owns the [`RunResult`]
//! and stops after exactly `total_requests` samples. The driver waits on
//! the worker pool first, which fixes the wall-clock span, and then on
//! the aggregator.
//!
//! [`Sample`]: crate::sample::Sample

pub mod aggregator;
pub mod pool;
pub mod worker;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::transport::Connector;

pub use aggregator::{LogProgress, NoProgress, Progress, RunResult};
pub use pool::partition;

/// Run a benchmark to completion.
///
/// # Errors
///
/// - [`Error::InvalidConfig`] if `config` fails validation; nothing is started
/// - [`Error::ConnectAborted`] under the fail-fast connect policy
/// - [`Error::WorkerFailed`] if a worker task panicked
///
/// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
/// [`Error::ConnectAborted`]: crate::Error::ConnectAborted
/// [`Error::WorkerFailed`]: crate::Error::WorkerFailed
pub async fn run<C, P>(config: RunConfig, connector: Arc<C>, progress: P) -> Result<RunResult>
where
    C: Connector,
    P: Progress,
{
    config.validate()?;
    let config = Arc::new(config);

    info!(
        url = %config.target,
        requests = config.total_requests,
        concurrency = config.concurrency,
        keep_alive = config.keep_alive,
        "Benchmarking {} (be patient)",
        config.target.host()
    );

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let aggregator = tokio::spawn(aggregator::aggregate(rx, config.total_requests, progress));

    let started = Instant::now();
    let workers = pool::spawn(&config, &connector, tx);
    if let Err(err) = pool::join(workers).await {
        aggregator.abort();
        return Err(err);
    }
    let elapsed = started.elapsed();

    let mut result = aggregator.await??;
    result.elapsed = elapsed;

    info!(
        completed = result.completed,
        failed = result.failed,
        elapsed = ?elapsed,
        "Benchmark finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectFailurePolicy, Encoding};
    use crate::error::Error;
    use crate::sample::Phase;
    use crate::target::Target;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes every request; optionally fails the first `fail_opens` opens.
    #[derive(Default)]
    struct Echo {
        opens: AtomicUsize,
        closes: AtomicUsize,
        fail_opens: usize,
    }

    #[async_trait]
    impl Connector for Echo {
        type Connection = Vec<u8>;

        async fn open(&self, _target: &Target) -> Result<Vec<u8>> {
            let n = self.opens.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_opens {
                return Err(Error::Io("connection refused".into()));
            }
            Ok(Vec::new())
        }

        async fn send(&self, conn: &mut Vec<u8>, payload: &[u8], _encoding: Encoding) -> Result<()> {
            *conn = payload.to_vec();
            Ok(())
        }

        async fn receive(&self, conn: &mut Vec<u8>) -> Result<Vec<u8>> {
            Ok(std::mem::take(conn))
        }

        async fn close(&self, _conn: Vec<u8>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(requests: usize, concurrency: usize) -> RunConfig {
        RunConfig::new(Target::parse("ws://127.0.0.1:1/").unwrap(), requests, concurrency)
            .with_payload(&b"abc"[..])
    }

    #[tokio::test]
    async fn test_run_keep_alive_opens_once_per_worker() {
        let echo = Arc::new(Echo::default());
        let result = run(config(12, 3), Arc::clone(&echo), NoProgress).await.unwrap();

        assert_eq!(result.completed, 12);
        assert_eq!(result.failed, 0);
        assert_eq!(result.bytes_sent, 36);
        assert_eq!(result.bytes_received, 36);
        assert_eq!(echo.opens.load(Ordering::SeqCst), 3);
        assert_eq!(echo.closes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_without_keep_alive_reconnects_each_cycle() {
        let echo = Arc::new(Echo::default());
        let result = run(config(8, 2).with_keep_alive(false), Arc::clone(&echo), NoProgress)
            .await
            .unwrap();

        assert_eq!(result.completed, 8);
        assert_eq!(echo.opens.load(Ordering::SeqCst), 8);
        assert_eq!(echo.closes.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_connect_failures_are_recorded() {
        let echo = Arc::new(Echo {
            fail_opens: 2,
            ..Echo::default()
        });
        let result = run(config(4, 1), echo, NoProgress).await.unwrap();

        assert_eq!(result.completed, 4);
        assert_eq!(result.failed, 2);
        assert_eq!(result.failures_in(Phase::Connect), 2);
        assert_eq!(result.total.len(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_aborts_when_requested() {
        let echo = Arc::new(Echo {
            fail_opens: 1,
            ..Echo::default()
        });
        let config = config(4, 1).with_connect_failure(ConnectFailurePolicy::Abort);
        let err = run(config, echo, NoProgress).await.unwrap_err();

        assert!(matches!(err, Error::ConnectAborted { worker: 0, cycle: 0, .. }));
    }

    #[tokio::test]
    async fn test_invalid_config_starts_nothing() {
        let echo = Arc::new(Echo::default());
        let err = run(config(2, 3), Arc::clone(&echo), NoProgress).await.unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(echo.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_small_channel_applies_backpressure_without_deadlock() {
        let echo = Arc::new(Echo::default());
        let result = run(config(500, 50).with_channel_capacity(1), echo, NoProgress)
            .await
            .unwrap();
        assert_eq!(result.completed, 500);
    }
}
