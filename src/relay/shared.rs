//! State shared between the control API and the event loop.
//!
//! Everything here lives behind the relay's single mutex. Transport events
//! are routed to a leg through the handle table, then forwarded, flushed or
//! turned into state transitions.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::transport::{Frame, HandleId, Transport, TransportEvent};

use super::connection::{Connection, ConnectionState, Leg};

// ============================================================================
// Shared
// ============================================================================

/// Mutex-guarded relay state.
#[derive(Debug)]
pub(crate) struct Shared {
    local: Connection,
    remote: Connection,
    /// Which leg owns each live handle.
    routes: FxHashMap<HandleId, Leg>,
    /// `None` means the next attempt is due immediately.
    pub(crate) last_reconnect_attempt: Option<Instant>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            local: Connection::new(Leg::Local),
            remote: Connection::new(Leg::Remote),
            routes: FxHashMap::default(),
            last_reconnect_attempt: None,
        }
    }

    #[inline]
    pub(crate) fn leg(&self, leg: Leg) -> &Connection {
        match leg {
            Leg::Local => &self.local,
            Leg::Remote => &self.remote,
        }
    }

    #[inline]
    fn leg_mut(&mut self, leg: Leg) -> &mut Connection {
        match leg {
            Leg::Local => &mut self.local,
            Leg::Remote => &mut self.remote,
        }
    }

    #[inline]
    pub(crate) fn state(&self, leg: Leg) -> ConnectionState {
        self.leg(leg).state()
    }

    /// Starts a connect attempt on `leg` and registers its route.
    pub(crate) fn connect(
        &mut self,
        leg: Leg,
        address: &str,
        transport: &dyn Transport,
    ) -> Result<HandleId> {
        let handle = self.leg_mut(leg).connect(address, transport)?;
        self.routes.insert(handle, leg);
        Ok(handle)
    }

    /// Closes `leg` immediately and forgets its route.
    pub(crate) fn force_close(&mut self, leg: Leg, transport: &dyn Transport) {
        if let Some(handle) = self.leg_mut(leg).force_close(transport) {
            self.routes.remove(&handle);
            debug!(%leg, %handle, "Connection force-closed");
        }
    }

    /// Closes both legs.
    pub(crate) fn close_all(&mut self, transport: &dyn Transport) {
        self.force_close(Leg::Local, transport);
        self.force_close(Leg::Remote, transport);
    }

    /// Applies one transport event.
    ///
    /// Events for handles that are no longer routed are ignored.
    pub(crate) fn dispatch(
        &mut self,
        event: TransportEvent,
        transport: &dyn Transport,
        verbose: bool,
    ) {
        let handle = event.handle();
        let Some(&leg) = self.routes.get(&handle) else {
            trace!(%handle, "Event for stale handle ignored");
            return;
        };

        match event {
            TransportEvent::Established { .. } => {
                self.leg_mut(leg).mark_established();
                info!(%leg, %handle, "Connected");
            }

            TransportEvent::Received { frame, .. } => {
                self.forward(leg, frame, transport, verbose);
            }

            TransportEvent::Writable { .. } => {
                if self.leg_mut(leg).flush(transport, verbose).is_err() {
                    self.routes.remove(&handle);
                }
            }

            TransportEvent::Closed { .. } => {
                self.routes.remove(&handle);
                self.leg_mut(leg).mark_closed();
                info!(%leg, %handle, "Connection closed");
            }

            TransportEvent::ConnectFailed { reason, .. } => {
                self.routes.remove(&handle);
                self.leg_mut(leg).mark_failed();
                error!(%leg, %handle, reason = %reason, "Connection error");
            }

            TransportEvent::WriteFailed { reason, .. } => {
                self.routes.remove(&handle);
                self.leg_mut(leg).mark_failed();
                transport.close(handle);
                error!(%leg, %handle, reason = %reason, "Write error");
            }
        }
    }

    /// Queues a frame received on `from` onto the opposite leg.
    fn forward(&mut self, from: Leg, frame: Frame, transport: &dyn Transport, verbose: bool) {
        if verbose {
            info!(from = %from, payload = %frame.lossy_text(), "Received");
        } else {
            trace!(from = %from, bytes = frame.len(), "Received");
        }

        let to = from.other();
        if !self.leg_mut(to).enqueue(frame, transport) {
            warn!(from = %from, to = %to, "Target leg not connected, frame dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::transport::mock::MockTransport;

    /// Connects both legs and returns `(shared, local_handle, remote_handle)`.
    fn bridged(transport: &MockTransport) -> (Shared, HandleId, HandleId) {
        let mut shared = Shared::new();
        let remote = shared
            .connect(Leg::Remote, "wss://remote.example/ws", transport)
            .expect("remote connect");
        shared.dispatch(TransportEvent::Established { handle: remote }, transport, false);
        let local = shared
            .connect(Leg::Local, "ws://localhost:4455", transport)
            .expect("local connect");
        shared.dispatch(TransportEvent::Established { handle: local }, transport, false);
        (shared, local, remote)
    }

    /// Delivers everything the transport has queued.
    fn pump(shared: &mut Shared, transport: &MockTransport) {
        for event in transport.service(Duration::ZERO) {
            shared.dispatch(event, transport, false);
        }
    }

    fn assert_handle_invariant(shared: &Shared) {
        for leg in [Leg::Local, Leg::Remote] {
            let conn = shared.leg(leg);
            match conn.state() {
                ConnectionState::Connected => assert!(conn.handle().is_some(), "{leg}"),
                ConnectionState::Disconnected | ConnectionState::Error => {
                    assert!(conn.handle().is_none(), "{leg}")
                }
                ConnectionState::Connecting => {}
            }
        }
    }

    #[test]
    fn test_established_marks_connected() {
        let transport = MockTransport::new();
        let (shared, _, _) = bridged(&transport);
        assert_eq!(shared.state(Leg::Local), ConnectionState::Connected);
        assert_eq!(shared.state(Leg::Remote), ConnectionState::Connected);
        assert_handle_invariant(&shared);
    }

    #[test]
    fn test_forward_verbatim_exactly_once() {
        let transport = MockTransport::new();
        let (mut shared, local, remote) = bridged(&transport);
        let frame = Frame::text(r#"{"op":6,"d":{"requestType":"GetVersion"}}"#);

        shared.dispatch(
            TransportEvent::Received {
                handle: remote,
                frame: frame.clone(),
            },
            &transport,
            false,
        );

        assert_eq!(shared.leg(Leg::Local).queued(), 1);
        assert_eq!(shared.leg(Leg::Remote).queued(), 0);
        assert!(transport.writes().is_empty());

        pump(&mut shared, &transport);

        assert_eq!(shared.leg(Leg::Local).queued(), 0);
        assert_eq!(transport.writes(), vec![(local, frame)]);
    }

    #[test]
    fn test_forward_both_directions() {
        let transport = MockTransport::new();
        let (mut shared, local, remote) = bridged(&transport);

        shared.dispatch(
            TransportEvent::Received {
                handle: local,
                frame: Frame::text("event"),
            },
            &transport,
            false,
        );
        pump(&mut shared, &transport);

        assert_eq!(transport.writes(), vec![(remote, Frame::text("event"))]);
    }

    #[test]
    fn test_write_failure_isolated_to_target() {
        let transport = MockTransport::new();
        let (mut shared, local, remote) = bridged(&transport);
        transport.fail_writes_on(local);

        // Frame waiting on the remote leg must survive the local failure.
        shared.dispatch(
            TransportEvent::Received {
                handle: local,
                frame: Frame::text("to-remote"),
            },
            &transport,
            false,
        );
        for text in ["one", "two"] {
            shared.dispatch(
                TransportEvent::Received {
                    handle: remote,
                    frame: Frame::text(text),
                },
                &transport,
                false,
            );
        }
        assert_eq!(shared.leg(Leg::Remote).queued(), 1);

        shared.dispatch(TransportEvent::Writable { handle: local }, &transport, false);

        assert_eq!(shared.state(Leg::Local), ConnectionState::Error);
        assert_eq!(shared.leg(Leg::Local).queued(), 0);
        assert_eq!(shared.state(Leg::Remote), ConnectionState::Connected);
        assert_eq!(shared.leg(Leg::Remote).queued(), 1);
        assert!(transport.closed().contains(&local));
        assert_handle_invariant(&shared);

        shared.dispatch(TransportEvent::Writable { handle: remote }, &transport, false);
        assert_eq!(transport.writes(), vec![(remote, Frame::text("to-remote"))]);
    }

    #[test]
    fn test_frames_dropped_when_target_not_connected() {
        let transport = MockTransport::new();
        let mut shared = Shared::new();
        let remote = shared
            .connect(Leg::Remote, "ws://remote", &transport)
            .expect("connect");
        shared.dispatch(TransportEvent::Established { handle: remote }, &transport, false);

        shared.dispatch(
            TransportEvent::Received {
                handle: remote,
                frame: Frame::text("nobody home"),
            },
            &transport,
            true,
        );

        assert_eq!(shared.leg(Leg::Local).queued(), 0);
        assert!(transport.writable_requests().is_empty());
    }

    #[test]
    fn test_closed_resets_leg() {
        let transport = MockTransport::new();
        let (mut shared, local, _) = bridged(&transport);

        shared.dispatch(TransportEvent::Closed { handle: local }, &transport, false);

        assert_eq!(shared.state(Leg::Local), ConnectionState::Disconnected);
        assert_eq!(shared.leg(Leg::Local).handle(), None);
        assert_handle_invariant(&shared);
    }

    #[test]
    fn test_connect_failed_moves_to_error() {
        let transport = MockTransport::new();
        let mut shared = Shared::new();
        let handle = shared
            .connect(Leg::Remote, "ws://remote", &transport)
            .expect("connect");

        shared.dispatch(
            TransportEvent::ConnectFailed {
                handle,
                reason: "connection refused".into(),
            },
            &transport,
            false,
        );

        assert_eq!(shared.state(Leg::Remote), ConnectionState::Error);
        assert_handle_invariant(&shared);
    }

    #[test]
    fn test_async_write_failure_moves_to_error() {
        let transport = MockTransport::new();
        let (mut shared, _, remote) = bridged(&transport);

        shared.dispatch(
            TransportEvent::WriteFailed {
                handle: remote,
                reason: "broken pipe".into(),
            },
            &transport,
            false,
        );

        assert_eq!(shared.state(Leg::Remote), ConnectionState::Error);
        assert!(transport.closed().contains(&remote));
        assert_handle_invariant(&shared);
    }

    #[test]
    fn test_stale_handle_events_ignored() {
        let transport = MockTransport::new();
        let (mut shared, local, _) = bridged(&transport);
        shared.force_close(Leg::Local, &transport);

        // A late close from the old socket must not touch the new attempt.
        let fresh = shared
            .connect(Leg::Local, "ws://localhost:4455", &transport)
            .expect("reconnect");
        shared.dispatch(TransportEvent::Closed { handle: local }, &transport, false);
        shared.dispatch(TransportEvent::Established { handle: local }, &transport, false);

        assert_eq!(shared.state(Leg::Local), ConnectionState::Connecting);
        assert_eq!(shared.leg(Leg::Local).handle(), Some(fresh));
    }

    #[test]
    fn test_close_all() {
        let transport = MockTransport::new();
        let (mut shared, local, remote) = bridged(&transport);

        shared.close_all(&transport);

        assert_eq!(shared.state(Leg::Local), ConnectionState::Disconnected);
        assert_eq!(shared.state(Leg::Remote), ConnectionState::Disconnected);
        assert_eq!(transport.closed(), vec![local, remote]);
        assert_handle_invariant(&shared);
    }
}
