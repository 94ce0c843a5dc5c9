//! In-memory connector with scripted failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use wsbench::{Connector, Encoding, Error, Result, Target};

/// Behaviour of a [`ScriptedConnector`].
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Every open fails.
    pub fail_connect: bool,
    /// Every send fails.
    pub fail_send: bool,
    /// Every n-th receive (counted across all workers) fails.
    pub fail_receive_every: Option<usize>,
    /// Fixed response length; `None` echoes the request.
    pub response_len: Option<usize>,
    /// Delay before each response.
    pub receive_delay: Option<Duration>,
}

/// Per-connection state: the last request sent.
pub struct MockConnection {
    pending: Vec<u8>,
}

#[derive(Default)]
pub struct ScriptedConnector {
    script: Script,
    opens: AtomicUsize,
    closes: AtomicUsize,
    receives: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = MockConnection;

    async fn open(&self, _target: &Target) -> Result<MockConnection> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_connect {
            return Err(Error::Io("connection refused".into()));
        }
        Ok(MockConnection {
            pending: Vec::new(),
        })
    }

    async fn send(&self, conn: &mut MockConnection, payload: &[u8], _encoding: Encoding) -> Result<()> {
        if self.script.fail_send {
            return Err(Error::Io("broken pipe".into()));
        }
        conn.pending = payload.to_vec();
        Ok(())
    }

    async fn receive(&self, conn: &mut MockConnection) -> Result<Vec<u8>> {
        if let Some(delay) = self.script.receive_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.receives.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.script.fail_receive_every, Some(every) if n % every == 0) {
            return Err(Error::ConnectionClosed(Some(1006)));
        }
        let request = std::mem::take(&mut conn.pending);
        Ok(match self.script.response_len {
            Some(len) => vec![b'x'; len],
            None => request,
        })
    }

    async fn close(&self, _conn: MockConnection) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
