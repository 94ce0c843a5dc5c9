//! Benchmark endpoint addresses.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// Scheme assumed when the address does not carry one.
pub const DEFAULT_SCHEME: &str = "ws";

/// A parsed `ws://host[:port]/path` endpoint.
///
/// Addresses without a scheme are treated as `ws://` addresses, so
/// `127.0.0.1:8080/ws` and `ws://127.0.0.1:8080/ws` are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    host: String,
    port: u16,
}

impl Target {
    /// Parse an endpoint address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] if the address is empty, malformed,
    /// has no host, or uses a scheme other than `ws` (`wss` included, since
    /// TLS is not supported).
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::InvalidTarget("address is empty".into()));
        }

        let url = if address.contains("://") {
            Url::parse(address)
        } else {
            Url::parse(&format!("{DEFAULT_SCHEME}://{address}"))
        }
        .map_err(|e| Error::InvalidTarget(format!("{address}: {e}")))?;

        if url.scheme() != DEFAULT_SCHEME {
            return Err(Error::InvalidTarget(format!(
                "unsupported scheme '{}', only ws:// is supported",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidTarget(format!("{address}: missing host")))?
            .to_owned();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidTarget(format!("{address}: missing port")))?;

        Ok(Self { url, host, port })
    }

    /// URL scheme (always `ws`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host name or address literal (IPv6 literals keep their brackets).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, or 80 when the address has none.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the address spelled out the port.
    #[must_use]
    pub fn has_explicit_port(&self) -> bool {
        self.url.port().is_some()
    }

    /// Request path without the query.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Path plus query, as sent on the HTTP request line.
    #[must_use]
    pub fn resource(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_owned(),
        }
    }

    /// `host:port`, suitable both for connecting and for the `Host` header.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The normalized address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
