//! Worker pool: request partitioning, spawning and the completion barrier.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::error;

use super::worker::Worker;
use crate::config::{RemainderPolicy, RunConfig};
use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::transport::Connector;

/// Split `total` cycles into `concurrency` shares.
///
/// Every share gets `total / concurrency` cycles. The remainder goes
/// entirely to worker 0 under [`RemainderPolicy::FirstWorker`], or one
/// extra cycle each to the first workers under [`RemainderPolicy::RoundRobin`].
/// The shares always sum to `total`.
///
/// # Example
///
/// ```
/// use wsbench::config::RemainderPolicy;
/// use wsbench::engine::partition;
///
/// assert_eq!(partition(10, 3, RemainderPolicy::FirstWorker), vec![4, 3, 3]);
/// assert_eq!(partition(11, 3, RemainderPolicy::RoundRobin), vec![4, 4, 3]);
/// ```
#[must_use]
pub fn partition(total: usize, concurrency: usize, policy: RemainderPolicy) -> Vec<usize> {
    if concurrency == 0 {
        return Vec::new();
    }
    let base = total / concurrency;
    let remainder = total % concurrency;
    let mut shares = vec![base; concurrency];
    match policy {
        RemainderPolicy::FirstWorker => shares[0] += remainder,
        RemainderPolicy::RoundRobin => {
            for share in shares.iter_mut().take(remainder) {
                *share += 1;
            }
        }
    }
    shares
}

/// Spawn one worker per share. Every worker gets its own sender clone; the
/// passed-in sender is dropped once all are spawned.
pub(crate) fn spawn<C: Connector>(
    config: &Arc<RunConfig>,
    connector: &Arc<C>,
    samples: mpsc::Sender<Sample>,
) -> JoinSet<Result<()>> {
    let mut workers = JoinSet::new();
    let shares = partition(config.total_requests, config.concurrency, config.remainder);
    for (id, cycles) in shares.into_iter().enumerate() {
        let worker = Worker::new(
            id,
            cycles,
            Arc::clone(config),
            Arc::clone(connector),
            samples.clone(),
        );
        workers.spawn(worker.run());
    }
    workers
}

/// Wait until every worker has finished.
///
/// The first worker error or panic aborts the remaining workers and is
/// returned.
pub(crate) async fn join(mut workers: JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = workers.join_next().await {
        let outcome = joined.map_err(Error::from).and_then(|r| r);
        if let Err(err) = outcome {
            error!(error = %err, "Worker failed, stopping pool");
            workers.abort_all();
            return Err(err);
        }
    }
    Ok(())
}
