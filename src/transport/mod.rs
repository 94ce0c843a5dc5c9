//! Connection providers.
//!
//! The engine only sees the [`Connector`] trait. [`WsConnector`] is the
//! RFC 6455 client used by the `wsb` binary; tests plug in scripted
//! connectors instead.

pub mod frame;
pub mod handshake;
pub mod websocket;

use async_trait::async_trait;

use crate::config::Encoding;
use crate::error::Result;
use crate::target::Target;

pub use websocket::{DEFAULT_MAX_MESSAGE_SIZE, WsConnection, WsConnector};

/// Opens duplex connections and exchanges single messages over them.
///
/// One connector is shared by every worker, while each connection is owned
/// by exactly one worker at a time.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Handle for an open connection.
    type Connection: Send;

    /// Open a new connection to `target`.
    async fn open(&self, target: &Target) -> Result<Self::Connection>;

    /// Send one request message.
    async fn send(&self, conn: &mut Self::Connection, payload: &[u8], encoding: Encoding) -> Result<()>;

    /// Wait for one response message.
    async fn receive(&self, conn: &mut Self::Connection) -> Result<Vec<u8>>;

    /// Close the connection. Errors are not reported.
    async fn close(&self, conn: Self::Connection);
}
