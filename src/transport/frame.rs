//! Client-side WebSocket frame encoding and decoding (RFC 6455).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                Masking key (client frames only)               |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented message (0x0).
    Continuation = 0x0,
    /// Text frame (0x1).
    Text = 0x1,
    /// Binary frame (0x2).
    Binary = 0x2,
    /// Close frame (0x8).
    Close = 0x8,
    /// Ping frame (0x9).
    Ping = 0x9,
    /// Pong frame (0xA).
    Pong = 0xA,
}

impl OpCode {
    /// Create an opcode from its wire value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFrame`] for reserved or out-of-range values.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::InvalidFrame(format!("reserved opcode {other:#x}"))),
        }
    }

    /// Check if this is a control frame opcode.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// A single decoded frame. Payloads are always unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Payload data.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// Create a close frame carrying a status code and reason.
    #[must_use]
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = code.to_be_bytes().to_vec();
        payload.extend_from_slice(reason.as_bytes());
        Self::new(true, OpCode::Close, payload)
    }

    /// Status code of a close frame, if it carries one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self.payload.as_slice() {
            [hi, lo, ..] if self.opcode == OpCode::Close => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Size of this frame on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        header_len(self.payload.len(), masked) + self.payload.len()
    }

    /// Append a single unfragmented frame to `buf`.
    ///
    /// Client frames must always be masked; pass `None` only for
    /// server-role frames (used by test peers).
    pub fn encode(opcode: OpCode, payload: &[u8], mask: Option<[u8; 4]>, buf: &mut BytesMut) {
        let len = payload.len();
        buf.reserve(header_len(len, mask.is_some()) + len);

        buf.put_u8(0x80 | opcode as u8);
        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if len <= 125 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= 0xFFFF {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(payload),
        }
    }

    /// Decode one frame sent by a server.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame,
    /// otherwise the frame and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// - [`Error::ProtocolViolation`] for masked frames, reserved bits, or
    ///   fragmented/oversized control frames
    /// - [`Error::InvalidFrame`] for reserved opcodes or payloads above `max_payload`
    pub fn decode(buf: &[u8], max_payload: usize) -> Result<Option<(Frame, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let byte0 = buf[0];
        let byte1 = buf[1];
        let fin = (byte0 & 0x80) != 0;
        if (byte0 & 0x70) != 0 {
            return Err(Error::ProtocolViolation(
                "reserved bits set without negotiated extension".into(),
            ));
        }
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        if (byte1 & 0x80) != 0 {
            return Err(Error::ProtocolViolation(
                "server frame must not be masked".into(),
            ));
        }

        let (payload_len, header_len) = match byte1 & 0x7F {
            len @ 0..=125 => (len as u64, 2),
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
            }
            _ => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 10)
            }
        };

        if opcode.is_control() {
            if !fin {
                return Err(Error::ProtocolViolation(
                    "control frames cannot be fragmented".into(),
                ));
            }
            if payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
                return Err(Error::ProtocolViolation(format!(
                    "control frame payload too large: {payload_len} bytes"
                )));
            }
        }
        let payload_len = usize::try_from(payload_len)
            .ok()
            .filter(|len| *len <= max_payload)
            .ok_or_else(|| {
                Error::InvalidFrame(format!(
                    "frame too large: {payload_len} bytes (max: {max_payload})"
                ))
            })?;

        let total = header_len + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let frame = Frame::new(fin, opcode, buf[header_len..total].to_vec());
        Ok(Some((frame, total)))
    }
}

fn header_len(payload_len: usize, masked: bool) -> usize {
    let extended = if payload_len <= 125 {
        0
    } else if payload_len <= 0xFFFF {
        2
    } else {
        8
    };
    2 + extended + if masked { 4 } else { 0 }
}

/// XOR `data` with the 4-byte masking key, four bytes at a time.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) ^ mask_u32;
        chunk.copy_from_slice(&val.to_ne_bytes());
    }
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}
