//! Loopback WebSocket server for integration tests.
//!
//! Provides a TestServer that listens on a random port and answers each
//! client according to a [`ServerMode`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use wsbench::transport::frame::{Frame, OpCode, apply_mask};
use wsbench::transport::handshake::{compute_accept_key, find_head_end};

/// How the server treats an upgraded connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Echo every data message with the same opcode.
    Echo,
    /// Read requests but never answer.
    Silent,
    /// Send a close frame right after the handshake.
    CloseImmediately,
}

pub struct TestServer {
    accept_task: JoinHandle<()>,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    /// Spawn an echo server on 127.0.0.1 with a random port.
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(ServerMode::Echo).await
    }

    pub async fn spawn_with(mode: ServerMode) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _ = serve(stream, mode).await;
                });
            }
        });

        (
            Self {
                accept_task,
                accepted,
            },
            addr,
        )
    }

    /// Number of TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
    }
}

async fn serve(mut stream: TcpStream, mode: ServerMode) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);

    let head_len = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_len]).into_owned();
    let _ = buf.split_to(head_len);

    let key = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("sec-websocket-key")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        compute_accept_key(&key)
    );
    stream.write_all(response.as_bytes()).await?;

    if mode == ServerMode::CloseImmediately {
        write_frame(&mut stream, OpCode::Close, &Frame::close(1011, "bye").payload).await?;
        return Ok(());
    }

    loop {
        let Some((opcode, payload)) = read_client_frame(&mut stream, &mut buf).await? else {
            return Ok(());
        };
        match opcode {
            OpCode::Close => {
                let _ = write_frame(&mut stream, OpCode::Close, &payload).await;
                return Ok(());
            }
            OpCode::Ping => write_frame(&mut stream, OpCode::Pong, &payload).await?,
            OpCode::Text | OpCode::Binary if mode == ServerMode::Echo => {
                write_frame(&mut stream, opcode, &payload).await?;
            }
            _ => {}
        }
    }
}

async fn write_frame(stream: &mut TcpStream, opcode: OpCode, payload: &[u8]) -> std::io::Result<()> {
    let mut out = BytesMut::new();
    Frame::encode(opcode, payload, None, &mut out);
    stream.write_all(&out).await
}

/// Read one masked client frame. `None` on EOF.
async fn read_client_frame(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
) -> std::io::Result<Option<(OpCode, Vec<u8>)>> {
    loop {
        if let Some((opcode, payload, used)) = parse_masked(buf) {
            let _ = buf.split_to(used);
            return Ok(Some((opcode, payload)));
        }
        if stream.read_buf(buf).await? == 0 {
            return Ok(None);
        }
    }
}

fn parse_masked(buf: &[u8]) -> Option<(OpCode, Vec<u8>, usize)> {
    if buf.len() < 2 {
        return None;
    }
    let opcode = OpCode::from_u8(buf[0] & 0x0F).ok()?;
    let (len, mut offset) = match buf[1] & 0x7F {
        126 => {
            if buf.len() < 4 {
                return None;
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
        }
        127 => {
            if buf.len() < 10 {
                return None;
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(raw) as usize, 10)
        }
        len => (len as usize, 2),
    };
    if buf.len() < offset + 4 + len {
        return None;
    }
    let mut mask = [0u8; 4];
    mask.copy_from_slice(&buf[offset..offset + 4]);
    offset += 4;
    let mut payload = buf[offset..offset + len].to_vec();
    apply_mask(&mut payload, mask);
    Some((opcode, payload, offset + len))
}
