//! Single consumer that folds samples into a [`RunResult`].

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Error, Result};
use crate::sample::{Phase, Sample};

/// Receives progress notifications from the aggregator.
pub trait Progress: Send + Sync + 'static {
    /// Called at each 10% boundary with the number of samples consumed so far.
    fn completed(&self, done: usize, total: usize);
}

/// Logs `Completed N requests` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn completed(&self, done: usize, total: usize) {
        info!(done, total, "Completed {done} requests");
    }
}

/// Discards progress notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn completed(&self, _done: usize, _total: usize) {}
}

/// Counters and latency buckets accumulated over a run.
///
/// Latencies are in milliseconds and only come from successful samples, in
/// arrival order. `completed == failed + total.len()` holds at all times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    /// Samples consumed.
    pub completed: u64,
    /// Failed samples.
    pub failed: u64,
    /// Failed samples per [`Phase`], indexed by [`Phase::index`].
    pub failures_by_phase: [u64; 3],
    /// Request bytes of successful cycles.
    pub bytes_sent: u64,
    /// Response bytes of successful cycles.
    pub bytes_received: u64,
    /// Sum of cycle durations over successful samples.
    pub total_successful_duration: Duration,
    /// Connect latencies of successful samples.
    pub connect: Vec<f64>,
    /// Send latencies of successful samples.
    pub send: Vec<f64>,
    /// Receive latencies of successful samples.
    pub receive: Vec<f64>,
    /// Whole-cycle latencies of successful samples.
    pub total: Vec<f64>,
    /// Wall clock from the first worker dispatch to the last worker exit.
    pub elapsed: Duration,
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

impl RunResult {
    /// Empty result with latency buckets sized for `expected` samples.
    #[must_use]
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            connect: Vec::with_capacity(expected),
            send: Vec::with_capacity(expected),
            receive: Vec::with_capacity(expected),
            total: Vec::with_capacity(expected),
            ..Self::default()
        }
    }

    /// Fold one sample in.
    pub fn record(&mut self, sample: Sample) {
        self.completed += 1;
        if let Some(phase) = sample.failed_phase() {
            self.failed += 1;
            self.failures_by_phase[phase.index()] += 1;
            return;
        }

        self.total_successful_duration += sample.total;
        self.bytes_sent += sample.bytes_sent;
        self.bytes_received += sample.bytes_received;
        self.connect.push(millis(sample.connect));
        self.send.push(millis(sample.send));
        self.receive.push(millis(sample.receive));
        self.total.push(millis(sample.total));
    }

    /// Number of successful samples.
    #[inline]
    #[must_use]
    pub fn successful(&self) -> u64 {
        self.completed - self.failed
    }

    /// Failures that happened in `phase`.
    #[inline]
    #[must_use]
    pub fn failures_in(&self, phase: Phase) -> u64 {
        self.failures_by_phase[phase.index()]
    }
}

/// Sample count between progress notifications.
#[must_use]
pub fn progress_step(total: usize) -> usize {
    (total / 10).max(1)
}

/// Consume exactly `expected` samples from `rx`.
///
/// Termination is count-based: the channel has many senders and none of
/// them closes it.
///
/// # Errors
///
/// Returns [`Error::ChannelClosed`] if every sender is dropped before
/// `expected` samples arrived.
pub async fn aggregate<P: Progress>(
    mut rx: mpsc::Receiver<Sample>,
    expected: usize,
    progress: P,
) -> Result<RunResult> {
    let mut result = RunResult::with_capacity(expected);
    let step = progress_step(expected);

    for done in 1..=expected {
        let sample = rx.recv().await.ok_or(Error::ChannelClosed)?;
        result.record(sample);
        if done % step == 0 || done == expected {
            progress.completed(done, expected);
        }
    }

    Ok(result)
}
