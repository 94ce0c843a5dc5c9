//! Client side of the WebSocket opening handshake (RFC 6455 section 4.1).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::target::Target;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Largest response head accepted from the server.
pub const MAX_HANDSHAKE_SIZE: usize = 8192;

/// Generate a fresh base64-encoded 16-byte `Sec-WebSocket-Key`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the OS random source is unavailable.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(|e| Error::Io(e.to_string()))?;
    Ok(BASE64.encode(nonce))
}

/// Computes the Sec-WebSocket-Accept value: Base64(SHA-1(key + GUID)).
///
/// # Example
///
/// ```
/// use wsbench::transport::handshake::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Build the HTTP upgrade request for `target`.
#[must_use]
pub fn upgrade_request(target: &Target, key: &str) -> String {
    let host = if target.has_explicit_port() {
        target.authority()
    } else {
        target.host().to_owned()
    };
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        target.resource(),
        host,
        key
    )
}

/// Offset just past the `\r\n\r\n` that ends the response head, if present.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }
    headers
}

/// Validate the server's handshake response head against the key we sent.
///
/// # Errors
///
/// Returns [`Error::InvalidHandshake`] if:
/// - the head is not valid UTF-8 or is empty
/// - the status is not `101`
/// - `Upgrade` is not `websocket` or `Connection` lacks `upgrade`
/// - `Sec-WebSocket-Accept` is missing or does not match `key`
pub fn verify_response(head: &[u8], key: &str) -> Result<()> {
    let text = std::str::from_utf8(head)
        .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;
    let mut lines = text.lines();

    let status_line = lines
        .next()
        .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;
    let mut status = status_line.split_whitespace();
    match (status.next(), status.next()) {
        (Some(version), Some("101")) if version.starts_with("HTTP/1.1") => {}
        _ => {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }
    }

    let headers = parse_headers(lines);

    let upgrade = headers
        .get("upgrade")
        .ok_or_else(|| Error::InvalidHandshake("Missing Upgrade header in response".into()))?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Upgrade header: {upgrade}"
        )));
    }

    let connection = headers.get("connection").ok_or_else(|| {
        Error::InvalidHandshake("Missing Connection header in response".into())
    })?;
    if !connection.to_lowercase().contains("upgrade") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Connection header: {connection}"
        )));
    }

    let accept = headers.get("sec-websocket-accept").ok_or_else(|| {
        Error::InvalidHandshake("Missing Sec-WebSocket-Accept header".into())
    })?;
    if *accept != compute_accept_key(key) {
        return Err(Error::InvalidHandshake(
            "Invalid Sec-WebSocket-Accept".into(),
        ));
    }

    Ok(())
}
