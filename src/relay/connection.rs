//! A single relay leg.
//!
//! [`Connection`] tracks one WebSocket leg: its state, the transport handle
//! of the current attempt and the frames waiting to be written to it.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──established──► Connected
//!       ▲                          │                          │
//!       │                        error                  closed/error
//!       │                          ▼                          │
//!       └────── connect() ◄────  Error                        │
//!       ▲                                                     │
//!       └─────────────────────────────────────────────────────┘
//! ```
//!
//! A handle is held only while `Connecting` or `Connected`.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, error, info};

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::transport::{Frame, HandleId, Transport};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a leg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// Connect attempt in flight.
    Connecting,
    /// Handshake done; frames flow.
    Connected,
    /// Last attempt or write failed.
    Error,
}

impl ConnectionState {
    /// Returns `true` for `Connecting` and `Connected`.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Returns the lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Leg
// ============================================================================

/// Which side of the relay a connection serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// The local control API.
    Local,
    /// The remote peer.
    Remote,
}

impl Leg {
    /// Returns the opposite leg.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }

    /// Returns the lowercase name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Connection
// ============================================================================

/// One leg of the relay.
#[derive(Debug)]
pub(crate) struct Connection {
    leg: Leg,
    state: ConnectionState,
    endpoint: Option<Endpoint>,
    handle: Option<HandleId>,
    outbound: VecDeque<Frame>,
}

impl Connection {
    pub(crate) fn new(leg: Leg) -> Self {
        Self {
            leg,
            state: ConnectionState::Disconnected,
            endpoint: None,
            handle: None,
            outbound: VecDeque::new(),
        }
    }

    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<HandleId> {
        self.handle
    }

    #[inline]
    pub(crate) fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    #[inline]
    pub(crate) fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Starts a connect attempt to `address`.
    ///
    /// A parse failure leaves the state untouched. A transport refusal moves
    /// the leg to `Error`.
    pub(crate) fn connect(&mut self, address: &str, transport: &dyn Transport) -> Result<HandleId> {
        let endpoint = Endpoint::parse(address).inspect_err(|e| {
            error!(leg = %self.leg, error = %e, "Failed to parse WebSocket URL");
        })?;

        match transport.connect(&endpoint) {
            Ok(handle) => {
                info!(leg = %self.leg, %handle, endpoint = %endpoint, "Connecting");
                self.state = ConnectionState::Connecting;
                self.handle = Some(handle);
                self.endpoint = Some(endpoint);
                Ok(handle)
            }
            Err(e) => {
                error!(leg = %self.leg, endpoint = %endpoint, error = %e, "Failed to start connection");
                self.state = ConnectionState::Error;
                self.handle = None;
                self.endpoint = Some(endpoint);
                Err(e)
            }
        }
    }

    /// Handshake completed.
    pub(crate) fn mark_established(&mut self) {
        if self.handle.is_some() {
            self.state = ConnectionState::Connected;
        }
    }

    /// Peer closed; returns the released handle.
    pub(crate) fn mark_closed(&mut self) -> Option<HandleId> {
        self.state = ConnectionState::Disconnected;
        self.outbound.clear();
        self.handle.take()
    }

    /// Attempt or socket failed; returns the released handle.
    pub(crate) fn mark_failed(&mut self) -> Option<HandleId> {
        self.state = ConnectionState::Error;
        self.outbound.clear();
        self.handle.take()
    }

    /// Queues a frame and asks the transport for a writable notification.
    ///
    /// Returns `false` (and drops the frame) unless the leg is connected.
    pub(crate) fn enqueue(&mut self, frame: Frame, transport: &dyn Transport) -> bool {
        match (self.state, self.handle) {
            (ConnectionState::Connected, Some(handle)) => {
                self.outbound.push_back(frame);
                transport.request_writable(handle);
                true
            }
            _ => false,
        }
    }

    /// Writes every queued frame in order.
    ///
    /// On the first failed write the rest of the queue is discarded, the
    /// handle is closed and the leg moves to `Error`.
    pub(crate) fn flush(&mut self, transport: &dyn Transport, verbose: bool) -> Result<usize> {
        let Some(handle) = self.handle else {
            self.outbound.clear();
            return Ok(0);
        };

        let mut written = 0;
        while let Some(frame) = self.outbound.pop_front() {
            if verbose {
                info!(leg = %self.leg, payload = %frame.lossy_text(), "Write");
            }

            if let Err(e) = transport.write(handle, &frame) {
                let dropped = self.outbound.len();
                self.mark_failed();
                transport.close(handle);
                error!(leg = %self.leg, error = %e, dropped, "Failed to write frame");
                return Err(e);
            }
            written += 1;
        }

        if written > 0 {
            debug!(leg = %self.leg, written, "Flushed outbound queue");
        }
        Ok(written)
    }

    /// Closes the handle, if any, and resets to `Disconnected`.
    pub(crate) fn force_close(&mut self, transport: &dyn Transport) -> Option<HandleId> {
        let handle = self.mark_closed();
        if let Some(handle) = handle {
            transport.close(handle);
        }
        handle
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::transport::mock::MockTransport;

    fn connected(leg: Leg, transport: &MockTransport) -> Connection {
        let mut conn = Connection::new(leg);
        conn.connect("ws://peer:9000", transport).expect("connect");
        conn.mark_established();
        conn
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(Leg::Remote.to_string(), "remote");
        assert_eq!(Leg::Local.other(), Leg::Remote);
    }

    #[test]
    fn test_connect_moves_to_connecting() {
        let transport = MockTransport::new();
        let mut conn = Connection::new(Leg::Remote);

        let handle = conn.connect("wss://example.com/ws", &transport).expect("connect");

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.handle(), Some(handle));
        assert_eq!(conn.endpoint().map(Endpoint::port), Some(443));
    }

    #[test]
    fn test_parse_failure_leaves_state() {
        let transport = MockTransport::new();
        let mut conn = Connection::new(Leg::Local);

        let result = conn.connect("http://localhost:4455", &transport);

        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.handle(), None);
        assert_eq!(transport.connect_count(), 0);
    }

    #[test]
    fn test_transport_refusal_moves_to_error() {
        let transport = MockTransport::new();
        transport.refuse_connects(true);
        let mut conn = Connection::new(Leg::Remote);

        assert!(conn.connect("ws://peer", &transport).is_err());
        assert_eq!(conn.state(), ConnectionState::Error);
        assert_eq!(conn.handle(), None);
    }

    #[test]
    fn test_enqueue_requires_connected() {
        let transport = MockTransport::new();
        let mut conn = Connection::new(Leg::Local);
        assert!(!conn.enqueue(Frame::text("x"), &transport));

        conn.connect("ws://peer", &transport).expect("connect");
        assert!(!conn.enqueue(Frame::text("x"), &transport));
        assert_eq!(conn.queued(), 0);
        assert!(transport.writable_requests().is_empty());
    }

    #[test]
    fn test_flush_writes_in_order() {
        let transport = MockTransport::new();
        let mut conn = connected(Leg::Local, &transport);
        let handle = conn.handle().expect("handle");

        for text in ["a", "b", "c"] {
            assert!(conn.enqueue(Frame::text(text), &transport));
        }
        assert_eq!(transport.writable_requests(), vec![handle; 3]);

        assert_eq!(conn.flush(&transport, false).expect("flush"), 3);
        assert_eq!(conn.queued(), 0);

        let written: Vec<_> = transport.writes().into_iter().map(|(_, f)| f).collect();
        assert_eq!(
            written,
            vec![Frame::text("a"), Frame::text("b"), Frame::text("c")]
        );
    }

    #[test]
    fn test_flush_failure_discards_queue() {
        let transport = MockTransport::new();
        let mut conn = connected(Leg::Remote, &transport);
        let handle = conn.handle().expect("handle");
        conn.enqueue(Frame::text("a"), &transport);
        conn.enqueue(Frame::text("b"), &transport);
        transport.fail_writes_on(handle);

        assert!(conn.flush(&transport, true).is_err());
        assert_eq!(conn.state(), ConnectionState::Error);
        assert_eq!(conn.queued(), 0);
        assert_eq!(conn.handle(), None);
        assert_eq!(transport.closed(), vec![handle]);
    }

    #[test]
    fn test_force_close() {
        let transport = MockTransport::new();
        let mut conn = connected(Leg::Local, &transport);
        let handle = conn.handle();
        conn.enqueue(Frame::text("pending"), &transport);

        assert_eq!(conn.force_close(&transport), handle);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.handle(), None);
        assert_eq!(conn.queued(), 0);
    }
}
