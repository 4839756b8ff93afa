//! Scripted in-memory transport for engine tests.
//!
//! Records every call the engine makes and lets a test inject events.
//! `service` returns queued events immediately; with nothing queued it
//! waits for the slice, or until cancelled when blocking mode is on.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

use super::{Frame, HandleId, Transport, TransportEvent};

#[derive(Default)]
struct MockState {
    connects: Vec<(HandleId, Endpoint)>,
    writes: Vec<(HandleId, Frame)>,
    closed: Vec<HandleId>,
    writable_requests: Vec<HandleId>,
    failing_writes: FxHashSet<HandleId>,
    refuse_connects: bool,
    block_until_cancelled: bool,
    cancelled: bool,
    pending: VecDeque<TransportEvent>,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
    wake: Condvar,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `service` ignores its slice and waits for `cancel_service`.
    pub(crate) fn blocking() -> Self {
        let transport = Self::default();
        transport.state.lock().block_until_cancelled = true;
        transport
    }

    pub(crate) fn push_event(&self, event: TransportEvent) {
        self.state.lock().pending.push_back(event);
        self.wake.notify_all();
    }

    pub(crate) fn fail_writes_on(&self, handle: HandleId) {
        self.state.lock().failing_writes.insert(handle);
    }

    pub(crate) fn refuse_connects(&self, refuse: bool) {
        self.state.lock().refuse_connects = refuse;
    }

    pub(crate) fn connects(&self) -> Vec<(HandleId, Endpoint)> {
        self.state.lock().connects.clone()
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.lock().connects.len()
    }

    pub(crate) fn writes(&self) -> Vec<(HandleId, Frame)> {
        self.state.lock().writes.clone()
    }

    pub(crate) fn closed(&self) -> Vec<HandleId> {
        self.state.lock().closed.clone()
    }

    pub(crate) fn writable_requests(&self) -> Vec<HandleId> {
        self.state.lock().writable_requests.clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, endpoint: &Endpoint) -> Result<HandleId> {
        let mut state = self.state.lock();
        if state.refuse_connects {
            return Err(Error::transport("connect refused by mock"));
        }
        let handle = HandleId::next();
        state.connects.push((handle, endpoint.clone()));
        Ok(handle)
    }

    fn request_writable(&self, handle: HandleId) {
        let mut state = self.state.lock();
        state.writable_requests.push(handle);
        state.pending.push_back(TransportEvent::Writable { handle });
        self.wake.notify_all();
    }

    fn write(&self, handle: HandleId, frame: &Frame) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_writes.contains(&handle) {
            return Err(Error::transport("write failed by mock"));
        }
        state.writes.push((handle, frame.clone()));
        Ok(())
    }

    fn close(&self, handle: HandleId) {
        self.state.lock().closed.push(handle);
    }

    fn service(&self, slice: Duration) -> Vec<TransportEvent> {
        let mut state = self.state.lock();

        if state.pending.is_empty() && !state.cancelled {
            if state.block_until_cancelled {
                while state.pending.is_empty() && !state.cancelled {
                    self.wake.wait(&mut state);
                }
            } else {
                self.wake.wait_for(&mut state, slice);
            }
        }

        state.cancelled = false;
        state.pending.drain(..).collect()
    }

    fn cancel_service(&self) {
        self.state.lock().cancelled = true;
        self.wake.notify_all();
    }
}
