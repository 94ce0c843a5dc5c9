//! One virtual client running a fixed number of request cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::{ConnectFailurePolicy, RunConfig};
use crate::error::{Error, Result};
use crate::sample::{Phase, Sample};
use crate::transport::Connector;

/// Drives cycles against the target and emits one [`Sample`] per cycle.
pub struct Worker<C: Connector> {
    id: usize,
    cycles: usize,
    config: Arc<RunConfig>,
    connector: Arc<C>,
    samples: mpsc::Sender<Sample>,
}

impl<C: Connector> Worker<C> {
    /// Create a worker assigned `cycles` request cycles.
    pub fn new(
        id: usize,
        cycles: usize,
        config: Arc<RunConfig>,
        connector: Arc<C>,
        samples: mpsc::Sender<Sample>,
    ) -> Self {
        Self {
            id,
            cycles,
            config,
            connector,
            samples,
        }
    }

    /// Run every assigned cycle, then close any held connection.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectAborted`] when a connect fails under
    ///   [`ConnectFailurePolicy::Abort`]
    /// - [`Error::ChannelClosed`] if the aggregator is gone
    pub async fn run(self) -> Result<()> {
        debug!(worker_id = self.id, cycles = self.cycles, "Worker started");

        let mut held = None;
        let outcome = self.drive(&mut held).await;
        if let Some(conn) = held.take() {
            self.close(conn).await;
        }

        debug!(worker_id = self.id, ok = outcome.is_ok(), "Worker finished");
        outcome
    }

    async fn drive(&self, held: &mut Option<C::Connection>) -> Result<()> {
        for cycle in 0..self.cycles {
            let sample = self.cycle(cycle, held).await?;
            self.samples
                .send(sample)
                .await
                .map_err(|_| Error::ChannelClosed)?;
        }
        Ok(())
    }

    async fn cycle(&self, cycle: usize, held: &mut Option<C::Connection>) -> Result<Sample> {
        let start = Instant::now();

        let mut conn = match held.take() {
            Some(conn) => conn,
            None => match self
                .deadline(Phase::Connect, self.connector.open(&self.config.target))
                .await
            {
                Ok(conn) => conn,
                Err(err) => return self.connect_failed(cycle, err),
            },
        };
        let connect = start.elapsed();

        let sent_at = Instant::now();
        if let Err(err) = self
            .deadline(
                Phase::Send,
                self.connector
                    .send(&mut conn, &self.config.payload, self.config.encoding),
            )
            .await
        {
            warn!(worker_id = self.id, cycle, error = %err, "Send failed");
            self.close(conn).await;
            return Ok(Sample::failed(Phase::Send));
        }
        let send = sent_at.elapsed();

        let received_at = Instant::now();
        let response = match self
            .deadline(Phase::Receive, self.connector.receive(&mut conn))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(worker_id = self.id, cycle, error = %err, "Receive failed");
                self.close(conn).await;
                return Ok(Sample::failed(Phase::Receive));
            }
        };
        let receive = received_at.elapsed();
        let total = start.elapsed();

        if self.config.keep_alive {
            *held = Some(conn);
        } else {
            self.close(conn).await;
        }

        Ok(Sample::succeeded(
            connect,
            send,
            receive,
            total,
            self.config.payload.len() as u64,
            response.len() as u64,
        ))
    }

    fn connect_failed(&self, cycle: usize, err: Error) -> Result<Sample> {
        match self.config.connect_failure {
            ConnectFailurePolicy::Record => {
                warn!(worker_id = self.id, cycle, error = %err, "Connect failed");
                Ok(Sample::failed(Phase::Connect))
            }
            ConnectFailurePolicy::Abort => {
                error!(worker_id = self.id, cycle, error = %err, "Connect failed, aborting run");
                Err(Error::ConnectAborted {
                    worker: self.id,
                    cycle,
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn deadline<T>(&self, phase: Phase, op: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.op_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| Error::Timeout(phase))?,
            None => op.await,
        }
    }

    async fn close(&self, conn: C::Connection) {
        match self.config.op_timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, self.connector.close(conn))
                    .await
                    .is_err()
                {
                    debug!(worker_id = self.id, "Close timed out");
                }
            }
            None => self.connector.close(conn).await,
        }
    }
}
