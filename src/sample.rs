//! Per-cycle measurement records.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// The three timed phases of a request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Opening the connection (TCP connect + upgrade handshake).
    Connect,
    /// Writing the request message.
    Send,
    /// Reading the response message.
    Receive,
}

impl Phase {
    /// All phases, in cycle order.
    pub const ALL: [Phase; 3] = [Phase::Connect, Phase::Send, Phase::Receive];

    /// Position of this phase in [`Phase::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Phase::Connect => 0,
            Phase::Send => 1,
            Phase::Receive => 2,
        }
    }

    /// Get human-readable name for this phase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Send => "send",
            Phase::Receive => "receive",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response received.
    Succeeded,
    /// The cycle stopped in the given phase.
    Failed(Phase),
}

/// Timing and byte counts for one request/response cycle.
///
/// Exactly one sample is produced per attempted cycle. Timings and byte
/// counts are only meaningful when [`Sample::is_success`] is true; failed
/// samples carry zeroes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Result of the cycle.
    pub outcome: Outcome,
    /// Time to obtain a connection (near zero when one was reused).
    pub connect: Duration,
    /// Time to write the request.
    pub send: Duration,
    /// Time to read the response.
    pub receive: Duration,
    /// Time from cycle start until the response was read.
    pub total: Duration,
    /// Request payload length.
    pub bytes_sent: u64,
    /// Response payload length.
    pub bytes_received: u64,
}

impl Sample {
    /// Sample for a cycle that completed its round trip.
    #[must_use]
    pub fn succeeded(
        connect: Duration,
        send: Duration,
        receive: Duration,
        total: Duration,
        bytes_sent: u64,
        bytes_received: u64,
    ) -> Self {
        Self {
            outcome: Outcome::Succeeded,
            connect,
            send,
            receive,
            total,
            bytes_sent,
            bytes_received,
        }
    }

    /// Sample for a cycle that failed in `phase`.
    #[must_use]
    pub fn failed(phase: Phase) -> Self {
        Self {
            outcome: Outcome::Failed(phase),
            connect: Duration::ZERO,
            send: Duration::ZERO,
            receive: Duration::ZERO,
            total: Duration::ZERO,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Check whether the cycle completed its round trip.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    /// Phase the cycle failed in, if any.
    #[inline]
    #[must_use]
    pub fn failed_phase(&self) -> Option<Phase> {
        match self.outcome {
            Outcome::Succeeded => None,
            Outcome::Failed(phase) => Some(phase),
        }
    }
}
