//! WebSocket client connections over TCP.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::Connector;
use super::frame::{Frame, OpCode};
use super::handshake::{self, MAX_HANDSHAKE_SIZE};
use crate::config::Encoding;
use crate::error::{Error, Result};
use crate::target::Target;

/// Largest reassembled response accepted by default (64 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 4096;
const NORMAL_CLOSURE: u16 = 1000;

/// Masking keys for one connection: a counter mixed over a random seed.
/// Falls back to the clock if the OS random source fails.
struct MaskSource(u32);

impl MaskSource {
    fn new() -> Self {
        let mut seed = [0u8; 4];
        if getrandom::getrandom(&mut seed).is_err() {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0x1234_5678, |d| d.subsec_nanos());
            seed = nanos.to_le_bytes();
        }
        Self(u32::from_le_bytes(seed))
    }

    fn next_key(&mut self) -> [u8; 4] {
        self.0 = self.0.wrapping_add(0x9E37_79B9);
        let x = self.0.wrapping_mul(0x85EB_CA6B);
        (x ^ (x >> 13)).wrapping_mul(0xC2B2_AE35).to_le_bytes()
    }
}

/// An open client connection that exchanges whole messages.
///
/// Generic over the byte stream so tests can drive it through an in-memory
/// duplex pipe; benchmarks use [`TcpStream`].
pub struct WsConnection<S = TcpStream> {
    stream: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    masks: MaskSource,
    max_message_size: usize,
}

impl WsConnection<TcpStream> {
    /// Connect over TCP and perform the upgrade handshake.
    ///
    /// # Errors
    ///
    /// I/O errors from connecting, or [`Error::InvalidHandshake`] if the
    /// server does not accept the upgrade.
    pub async fn connect(target: &Target, max_message_size: usize) -> Result<Self> {
        let stream = TcpStream::connect(target.authority()).await?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, target, max_message_size).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> WsConnection<S> {
    /// Run the client handshake over an already connected stream.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandshake`] for a rejected or oversized response
    /// - [`Error::ConnectionClosed`] if the peer hangs up mid-handshake
    pub async fn handshake(mut stream: S, target: &Target, max_message_size: usize) -> Result<Self> {
        let key = handshake::generate_key()?;
        stream
            .write_all(handshake::upgrade_request(target, &key).as_bytes())
            .await?;
        stream.flush().await?;

        let mut read_buf = BytesMut::with_capacity(READ_CHUNK);
        let head_len = loop {
            if let Some(end) = handshake::find_head_end(&read_buf) {
                break end;
            }
            if read_buf.len() > MAX_HANDSHAKE_SIZE {
                return Err(Error::InvalidHandshake(format!(
                    "response head exceeds {MAX_HANDSHAKE_SIZE} bytes"
                )));
            }
            read_buf.reserve(READ_CHUNK);
            if stream.read_buf(&mut read_buf).await? == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        };

        // Anything after the head already belongs to the frame stream.
        let head = read_buf.split_to(head_len);
        handshake::verify_response(&head, &key)?;

        Ok(Self {
            stream,
            read_buf,
            write_buf: BytesMut::with_capacity(READ_CHUNK),
            masks: MaskSource::new(),
            max_message_size,
        })
    }

    async fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let mask = self.masks.next_key();
        self.write_buf.clear();
        Frame::encode(opcode, payload, Some(mask), &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some((frame, used)) = Frame::decode(&self.read_buf, self.max_message_size)? {
                self.read_buf.advance(used);
                return Ok(frame);
            }
            self.read_buf.reserve(READ_CHUNK);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                return Err(Error::ConnectionClosed(None));
            }
        }
    }

    /// Send one unfragmented data message.
    ///
    /// # Errors
    ///
    /// I/O errors from the underlying stream.
    pub async fn send(&mut self, payload: &[u8], encoding: Encoding) -> Result<()> {
        let opcode = match encoding {
            Encoding::Text => OpCode::Text,
            Encoding::Binary => OpCode::Binary,
        };
        self.write_frame(opcode, payload).await
    }

    /// Receive the next data message, reassembling fragments.
    ///
    /// Pings are answered and pongs skipped while waiting. A close frame
    /// from the server is acknowledged and reported as
    /// [`Error::ConnectionClosed`].
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the server closed the connection
    /// - [`Error::ProtocolViolation`] / [`Error::InvalidFrame`] for bad frames
    ///   or a message above the size limit
    /// - I/O errors from the underlying stream
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut partial: Option<Vec<u8>> = None;
        loop {
            let frame = self.read_frame().await?;
            match frame.opcode {
                OpCode::Ping => self.write_frame(OpCode::Pong, &frame.payload).await?,
                OpCode::Pong => {}
                OpCode::Close => {
                    let code = frame.close_code();
                    let echo = code.map(u16::to_be_bytes);
                    let _ = self
                        .write_frame(OpCode::Close, echo.as_ref().map_or(&[][..], |c| &c[..]))
                        .await;
                    return Err(Error::ConnectionClosed(code));
                }
                OpCode::Text | OpCode::Binary => {
                    if partial.is_some() {
                        return Err(Error::ProtocolViolation(
                            "new data frame before fragmented message completed".into(),
                        ));
                    }
                    if frame.fin {
                        return Ok(frame.payload);
                    }
                    partial = Some(frame.payload);
                }
                OpCode::Continuation => {
                    let message = partial.as_mut().ok_or_else(|| {
                        Error::ProtocolViolation("continuation frame without a message".into())
                    })?;
                    if message.len() + frame.payload.len() > self.max_message_size {
                        return Err(Error::InvalidFrame(format!(
                            "message too large (max: {})",
                            self.max_message_size
                        )));
                    }
                    message.extend_from_slice(&frame.payload);
                    if frame.fin {
                        return Ok(std::mem::take(message));
                    }
                }
            }
        }
    }

    /// Send a normal-closure frame and shut the stream down, ignoring errors.
    pub async fn close(mut self) {
        let payload = Frame::close(NORMAL_CLOSURE, "").payload;
        let _ = self.write_frame(OpCode::Close, &payload).await;
        let _ = self.stream.shutdown().await;
    }
}

/// [`Connector`] that benchmarks a real WebSocket server over TCP.
#[derive(Debug, Clone)]
pub struct WsConnector {
    max_message_size: usize,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl WsConnector {
    /// Create a connector with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest response message accepted.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn open(&self, target: &Target) -> Result<WsConnection> {
        WsConnection::connect(target, self.max_message_size).await
    }

    async fn send(&self, conn: &mut WsConnection, payload: &[u8], encoding: Encoding) -> Result<()> {
        conn.send(payload, encoding).await
    }

    async fn receive(&self, conn: &mut WsConnection) -> Result<Vec<u8>> {
        conn.recv().await
    }

    async fn close(&self, conn: WsConnection) {
        conn.close().await;
    }
}
