//! WebSocket endpoint addresses.
//!
//! [`Endpoint::parse`] turns a `ws://` or `wss://` URL into the pieces the
//! transport needs to dial it.
//!
//! # Example
//!
//! ```
//! use ws_relay::Endpoint;
//!
//! let endpoint = Endpoint::parse("wss://relay.example.com/ws").unwrap();
//! assert_eq!(endpoint.host(), "relay.example.com");
//! assert_eq!(endpoint.port(), 443);
//! assert_eq!(endpoint.path(), "/ws");
//! assert!(endpoint.use_tls());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Host;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Plain WebSocket scheme prefix.
const WS_PREFIX: &str = "ws://";

/// TLS WebSocket scheme prefix.
const WSS_PREFIX: &str = "wss://";

/// Default port for `ws://`.
const WS_DEFAULT_PORT: u16 = 80;

/// Default port for `wss://`.
const WSS_DEFAULT_PORT: u16 = 443;

// ============================================================================
// Endpoint
// ============================================================================

/// A parsed WebSocket target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
    path: String,
    use_tls: bool,
}

impl Endpoint {
    /// Parses a WebSocket URL.
    ///
    /// The input must start with `ws://` (port 80) or `wss://` (port 443).
    /// An explicit `:port` in `1..=65535` overrides the default, and a
    /// missing path becomes `/`. Host and path are kept exactly as written;
    /// a query or fragment stays attached to the path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for any other scheme, an empty or
    /// malformed host, or a port that is not a number in range.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let (rest, use_tls) = if let Some(rest) = input.strip_prefix(WSS_PREFIX) {
            (rest, true)
        } else if let Some(rest) = input.strip_prefix(WS_PREFIX) {
            (rest, false)
        } else {
            return Err(Error::invalid_url(
                input,
                "scheme must be ws:// or wss://",
            ));
        };

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(authority_end);

        let (host, port) =
            split_authority(authority).map_err(|reason| Error::invalid_url(input, reason))?;

        // Validation only; the host is stored as written.
        Host::parse(host).map_err(|e| Error::invalid_url(input, format!("invalid host: {e}")))?;

        let port = match port {
            Some(digits) => parse_port(digits).map_err(|reason| Error::invalid_url(input, reason))?,
            None if use_tls => WSS_DEFAULT_PORT,
            None => WS_DEFAULT_PORT,
        };

        let path = if tail.starts_with('/') {
            tail.to_string()
        } else {
            format!("/{tail}")
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
            use_tls,
        })
    }

    /// Host name or address literal.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit or scheme-default port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Request path, always starting with `/`.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the connection is TLS-secured (`wss://`).
    #[inline]
    #[must_use]
    pub const fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// Rebuilds a dialable URL with the resolved port made explicit.
    #[must_use]
    pub fn to_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

/// Splits `host[:port]`, keeping bracketed IPv6 literals whole.
fn split_authority(authority: &str) -> std::result::Result<(&str, Option<&str>), &'static str> {
    if authority.is_empty() {
        return Err("missing host");
    }

    if authority.starts_with('[') {
        let end = authority.find(']').ok_or("unterminated IPv6 literal")?;
        let (host, after) = authority.split_at(end + 1);
        return match after {
            "" => Ok((host, None)),
            _ => after
                .strip_prefix(':')
                .map(|port| (host, Some(port)))
                .ok_or("unexpected characters after host"),
        };
    }

    match authority.split_once(':') {
        Some(("", _)) => Err("missing host"),
        Some((host, port)) => Ok((host, Some(port))),
        None => Ok((authority, None)),
    }
}

/// Parses an explicit port; it must be all digits and within `1..=65535`.
fn parse_port(digits: &str) -> std::result::Result<u16, &'static str> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err("port must be a number");
    }
    digits
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or("port out of range")
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

// ============================================================================
// Tests
// ============================================================================
