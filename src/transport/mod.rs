//! WebSocket transport layer.
//!
//! This module hides the socket library behind the [`Transport`] trait so
//! the relay engine only deals in handles, frames and events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   connect / write / close   ┌──────────────────────┐
//! │  Relay engine    │────────────────────────────►│  Transport           │
//! │  (event loop     │                             │  (one task per       │
//! │   thread)        │◄────────────────────────────│   handle)            │
//! └──────────────────┘   service() → events        └──────────────────────┘
//! ```
//!
//! # Handle Lifecycle
//!
//! 1. `Transport::connect` - Allocate a [`HandleId`] and start dialing
//! 2. [`TransportEvent::Established`] - Handshake done, frames may flow
//! 3. `Transport::request_writable` - Ask for a [`TransportEvent::Writable`]
//! 4. `Transport::write` - Queue one frame on the socket
//! 5. `Transport::close` - Drop the handle; no further events are routed
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Frame payloads passed between legs |
//! | `websocket` | tokio-tungstenite implementation |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Frame payloads.
pub mod frame;

/// tokio-tungstenite client transport.
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{Frame, FrameKind};
pub use websocket::WebSocketTransport;

// ============================================================================
// HandleId
// ============================================================================

/// Global counter for handle allocation.
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one transport connection.
///
/// A fresh id is allocated for every connect attempt, so events from a
/// closed connection can never be mistaken for a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Allocates the next process-unique handle id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened on a handle, delivered by [`Transport::service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Client handshake completed.
    Established {
        /// Source handle.
        handle: HandleId,
    },
    /// A data frame arrived.
    Received {
        /// Source handle.
        handle: HandleId,
        /// The frame as received.
        frame: Frame,
    },
    /// The handle can accept writes (answer to `request_writable`).
    Writable {
        /// Source handle.
        handle: HandleId,
    },
    /// The peer closed the connection or the stream ended.
    Closed {
        /// Source handle.
        handle: HandleId,
    },
    /// The connect attempt failed before the handshake completed.
    ConnectFailed {
        /// Source handle.
        handle: HandleId,
        /// Failure description.
        reason: String,
    },
    /// A queued frame could not be written to the socket.
    WriteFailed {
        /// Source handle.
        handle: HandleId,
        /// Failure description.
        reason: String,
    },
}

impl TransportEvent {
    /// Returns the handle this event concerns.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> HandleId {
        match self {
            Self::Established { handle }
            | Self::Received { handle, .. }
            | Self::Writable { handle }
            | Self::Closed { handle }
            | Self::ConnectFailed { handle, .. }
            | Self::WriteFailed { handle, .. } => *handle,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Client-side WebSocket transport used by the relay engine.
///
/// Every method except [`service`](Transport::service) must be non-blocking:
/// the engine calls them while holding its shared lock. `service` is only
/// ever called from the event loop thread.
pub trait Transport: Send + Sync {
    /// Starts an asynchronous connect to `endpoint`.
    ///
    /// The outcome arrives later as [`TransportEvent::Established`] or
    /// [`TransportEvent::ConnectFailed`].
    fn connect(&self, endpoint: &Endpoint) -> Result<HandleId>;

    /// Asks for a [`TransportEvent::Writable`] on the next service call.
    fn request_writable(&self, handle: HandleId);

    /// Queues one frame for transmission.
    ///
    /// # Errors
    ///
    /// Fails if the handle is unknown or its connection is gone.
    fn write(&self, handle: HandleId, frame: &Frame) -> Result<()>;

    /// Closes the handle with a normal close status.
    ///
    /// Unknown handles are ignored.
    fn close(&self, handle: HandleId);

    /// Drives I/O for at most `slice` and returns the events that are ready.
    ///
    /// Returns early when events arrive or when
    /// [`cancel_service`](Transport::cancel_service) is called.
    fn service(&self, slice: Duration) -> Vec<TransportEvent>;

    /// Interrupts the in-progress (or next) service call.
    fn cancel_service(&self);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ids_are_unique() {
        let a = HandleId::next();
        let b = HandleId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_handle_display() {
        let handle = HandleId(42);
        assert_eq!(handle.to_string(), "#42");
    }

    #[test]
    fn test_event_handle() {
        let handle = HandleId::next();
        let event = TransportEvent::Received {
            handle,
            frame: Frame::text("{}"),
        };
        assert_eq!(event.handle(), handle);

        let event = TransportEvent::WriteFailed {
            handle,
            reason: "broken pipe".into(),
        };
        assert_eq!(event.handle(), handle);
    }
}
