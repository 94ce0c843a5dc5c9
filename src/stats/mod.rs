//! Latency statistics over sorted millisecond sequences.

pub mod report;

use serde::Serialize;

pub use report::{FailureCounts, Latency, Summary, summarize};

/// Percentile cut points reported for total request time.
pub const LADDER: [u32; 9] = [50, 66, 75, 80, 90, 95, 98, 99, 100];

/// Nearest-rank index for percentile `p` over `len` sorted values:
/// `ceil(len * p / 100) - 1`, clamped to `0..len`.
#[inline]
#[must_use]
pub fn nearest_rank_index(len: usize, p: u32) -> usize {
    let rank = (len * p as usize).div_ceil(100);
    rank.saturating_sub(1).min(len.saturating_sub(1))
}

/// Nearest-rank percentile of an ascending sequence, `None` if it is empty.
#[must_use]
pub fn percentile(sorted: &[f64], p: u32) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[nearest_rank_index(sorted.len(), p)])
}

/// Copy and sort ascending.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

/// One row of the percentile ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentile {
    /// Rank in `1..=100`.
    pub percent: u32,
    /// Latency at that rank, in milliseconds.
    pub millis: f64,
}

/// Ladder over an ascending sequence; empty when the sequence is.
#[must_use]
pub fn ladder(sorted: &[f64]) -> Vec<Percentile> {
    LADDER
        .iter()
        .filter_map(|&percent| {
            percentile(sorted, percent).map(|millis| Percentile { percent, millis })
        })
        .collect()
}

/// Summary of one latency sequence, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseStats {
    pub min: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator), 0 for fewer than two values.
    pub stddev: f64,
    /// Nearest-rank 50th percentile (no interpolation).
    pub median: f64,
    pub max: f64,
}

impl PhaseStats {
    /// Compute from an ascending sequence. `None` if it is empty.
    #[must_use]
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let stddev = if sorted.len() < 2 {
            0.0
        } else {
            let sum_sq: f64 = sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
            (sum_sq / (n - 1.0)).sqrt()
        };
        let median = percentile(sorted, 50)?;

        Some(Self {
            min,
            mean,
            stddev,
            median,
            max,
        })
    }
}
