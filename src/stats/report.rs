//! Post-run summary and its text/JSON renderings.

use std::fmt;

use serde::Serialize;

use super::{Percentile, PhaseStats, ladder, sorted};
use crate::config::{Encoding, RunConfig};
use crate::engine::RunResult;
use crate::error::{Error, Result};
use crate::sample::Phase;

/// Failed cycles broken down by the phase they failed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub connect: u64,
    pub send: u64,
    pub receive: u64,
}

/// Latency figures, available only when at least one cycle succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Latency {
    pub connect: PhaseStats,
    pub send: PhaseStats,
    pub receive: PhaseStats,
    pub total: PhaseStats,
    /// Nearest-rank ladder over total request time.
    pub percentiles: Vec<Percentile>,
}

impl Latency {
    /// Compute per-phase statistics and the percentile ladder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuccessfulRequests`] if any latency sequence is empty.
    pub fn compute(result: &RunResult) -> Result<Self> {
        let stats = |values: &[f64]| {
            PhaseStats::from_sorted(&sorted(values)).ok_or(Error::NoSuccessfulRequests)
        };
        let total = sorted(&result.total);

        Ok(Self {
            connect: stats(&result.connect)?,
            send: stats(&result.send)?,
            receive: stats(&result.receive)?,
            total: PhaseStats::from_sorted(&total).ok_or(Error::NoSuccessfulRequests)?,
            percentiles: ladder(&total),
        })
    }
}

/// Everything the report prints, computed once from a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub server_scheme: String,
    pub server_hostname: String,
    pub server_port: u16,
    pub document_path: String,
    pub concurrency: usize,
    pub keep_alive: bool,
    pub encoding: Encoding,
    pub time_taken_secs: f64,
    pub complete_requests: u64,
    pub failed_requests: u64,
    pub failures: FailureCounts,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub requests_per_sec: f64,
    /// Mean duration of a successful cycle; `None` when none succeeded.
    pub time_per_request_ms: Option<f64>,
    pub received_kb_per_sec: f64,
    pub sent_kb_per_sec: f64,
    /// `None` when no cycle succeeded.
    pub latency: Option<Latency>,
}

/// Build the summary for `result`. Does not modify its input, so calling it
/// twice yields equal summaries.
#[must_use]
pub fn summarize(result: &RunResult, config: &RunConfig) -> Summary {
    let secs = result.elapsed.as_secs_f64();
    let per_sec = |count: u64| {
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    };
    let successful = result.successful();
    let time_per_request_ms = (successful > 0)
        .then(|| result.total_successful_duration.as_nanos() as f64 / 1e6 / successful as f64);

    let target = &config.target;
    Summary {
        server_scheme: target.scheme().to_owned(),
        server_hostname: target.host().to_owned(),
        server_port: target.port(),
        document_path: target.path().to_owned(),
        concurrency: config.concurrency,
        keep_alive: config.keep_alive,
        encoding: config.encoding,
        time_taken_secs: secs,
        complete_requests: result.completed,
        failed_requests: result.failed,
        failures: FailureCounts {
            connect: result.failures_in(Phase::Connect),
            send: result.failures_in(Phase::Send),
            receive: result.failures_in(Phase::Receive),
        },
        bytes_sent: result.bytes_sent,
        bytes_received: result.bytes_received,
        requests_per_sec: per_sec(result.completed),
        time_per_request_ms,
        received_kb_per_sec: per_sec(result.bytes_received) / 1000.0,
        sent_kb_per_sec: per_sec(result.bytes_sent) / 1000.0,
        latency: Latency::compute(result).ok(),
    }
}

impl Summary {
    /// Latency figures.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuccessfulRequests`] for a run where every cycle failed.
    pub fn latency(&self) -> Result<&Latency> {
        self.latency.as_ref().ok_or(Error::NoSuccessfulRequests)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn stats_row(f: &mut fmt::Formatter<'_>, label: &str, s: &PhaseStats) -> fmt::Result {
    writeln!(
        f,
        "{:<10}{:>9.2}{:>9.2}{:>8.2}{:>9.2}{:>9.2}",
        label, s.min, s.mean, s.stddev, s.median, s.max
    )
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server Scheme:          {}", self.server_scheme)?;
        writeln!(f, "Server Hostname:        {}", self.server_hostname)?;
        writeln!(f, "Server Port:            {}", self.server_port)?;
        writeln!(f)?;
        writeln!(f, "Document Path:          {}", self.document_path)?;
        writeln!(f)?;
        writeln!(f, "Concurrency Level:      {}", self.concurrency)?;
        writeln!(f, "Time taken for tests:   {:.3} seconds", self.time_taken_secs)?;
        writeln!(f, "Complete requests:      {}", self.complete_requests)?;
        writeln!(f, "Failed requests:        {}", self.failed_requests)?;
        if self.failed_requests > 0 {
            writeln!(
                f,
                "   (Connect: {}, Send: {}, Receive: {})",
                self.failures.connect, self.failures.send, self.failures.receive
            )?;
        }
        writeln!(f, "Total data sent:        {} bytes", self.bytes_sent)?;
        writeln!(f, "Total data recv:        {} bytes", self.bytes_received)?;
        writeln!(
            f,
            "Requests per second:    {:.2} [#/sec] (mean)",
            self.requests_per_sec
        )?;
        match self.time_per_request_ms {
            Some(ms) => writeln!(f, "Time per request:       {ms:.2} [ms] (mean)")?,
            None => writeln!(f, "Time per request:       n/a")?,
        }
        writeln!(
            f,
            "Transfer rate:          {:.2} [Kbytes/sec] received",
            self.received_kb_per_sec
        )?;
        writeln!(f, "                        {:.2} kb/s sent", self.sent_kb_per_sec)?;
        writeln!(f)?;

        let Some(latency) = &self.latency else {
            return writeln!(f, "{}", Error::NoSuccessfulRequests);
        };

        writeln!(f, "Connection Times (ms)")?;
        writeln!(
            f,
            "{:<10}{:>9}{:>9}{:>8}{:>9}{:>9}",
            "", "min", "mean", "[+/-sd]", "median", "max"
        )?;
        stats_row(f, "Connect:", &latency.connect)?;
        stats_row(f, "Sent:", &latency.send)?;
        stats_row(f, "Recv:", &latency.receive)?;
        stats_row(f, "Total:", &latency.total)?;
        writeln!(f)?;

        writeln!(
            f,
            "Percentage of the requests served within a certain time (ms)"
        )?;
        for row in &latency.percentiles {
            let suffix = if row.percent == 100 {
                " (longest request)"
            } else {
                ""
            };
            writeln!(f, " {:>3}%    {:.2}{}", row.percent, row.millis, suffix)?;
        }
        Ok(())
    }
}
