//! Relay control API.
//!
//! [`Relay`] owns the transport, both legs and the event loop thread. All
//! methods take `&self` and may be called from any thread.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::transport::{Transport, WebSocketTransport};

use super::connection::{ConnectionState, Leg};
use super::event_loop::EventLoop;
use super::shared::Shared;

// ============================================================================
// Relay
// ============================================================================

/// Bidirectional WebSocket relay between a local control API and a remote
/// peer.
///
/// The remote leg is connected first. The local leg is connected only while
/// the remote one is up, and frames are copied unchanged between them.
///
/// # Example
///
/// ```no_run
/// use ws_relay::{Relay, RelayConfig};
///
/// # fn example() -> ws_relay::Result<()> {
/// let config = RelayConfig::new().with_remote_address("wss://relay.example.com/ws");
/// let relay = Relay::create(config)?;
///
/// relay.start()?;
/// // ...
/// relay.stop();
/// # Ok(())
/// # }
/// ```
pub struct Relay {
    config: Arc<RelayConfig>,
    transport: Arc<dyn Transport>,
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    /// Event loop thread; the mutex also serializes `start` and `stop`.
    thread: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// Relay - Constructors
// ============================================================================

impl Relay {
    /// Creates a stopped relay backed by a [`WebSocketTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the transport cannot be created.
    pub fn create(config: RelayConfig) -> Result<Self> {
        let transport = WebSocketTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a stopped relay over the given transport.
    #[must_use]
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        debug!(
            local = %config.local_address,
            remote = %config.remote_address,
            "Relay created"
        );

        Self {
            config: Arc::new(config),
            transport,
            shared: Arc::new(Mutex::new(Shared::new())),
            running: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        }
    }
}

// ============================================================================
// Relay - Lifecycle
// ============================================================================

impl Relay {
    /// Starts the event loop.
    ///
    /// Calling this on a running relay does nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the remote or local address is blank
    /// - [`Error::Allocation`] if the loop thread cannot be spawned
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock();

        if self.running.load(Ordering::Acquire) {
            warn!("Relay already running");
            return Ok(());
        }

        if !self.config.has_remote_address() {
            return Err(Error::config("Remote address not configured"));
        }
        if !self.config.has_local_address() {
            return Err(Error::config("Local address not configured"));
        }

        self.shared.lock().last_reconnect_attempt = None;
        self.running.store(true, Ordering::Release);

        let event_loop = EventLoop {
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
            transport: Arc::clone(&self.transport),
            running: Arc::clone(&self.running),
        };

        match event_loop.spawn() {
            Ok(handle) => {
                *thread = Some(handle);
                info!(remote = %self.config.remote_address, "Relay started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(error = %e, "Failed to spawn event loop");
                Err(Error::allocation(format!("event loop thread: {e}")))
            }
        }
    }

    /// Stops the event loop and closes both legs.
    ///
    /// Returns once the loop thread has exited. Does nothing when stopped.
    pub fn stop(&self) {
        let mut thread = self.thread.lock();

        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.transport.cancel_service();
        self.shared.lock().close_all(self.transport.as_ref());

        if let Some(handle) = thread.take()
            && handle.join().is_err()
        {
            error!("Event loop thread panicked");
        }

        info!("Relay stopped");
    }

    /// Stops the relay and releases it.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Relay - Queries
// ============================================================================

impl Relay {
    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns `true` when both legs are connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let shared = self.shared.lock();
        shared.state(Leg::Local) == ConnectionState::Connected
            && shared.state(Leg::Remote) == ConnectionState::Connected
    }

    /// State of the local control API leg.
    #[inline]
    #[must_use]
    pub fn local_state(&self) -> ConnectionState {
        self.leg_state(Leg::Local)
    }

    /// State of the remote peer leg.
    #[inline]
    #[must_use]
    pub fn remote_state(&self) -> ConnectionState {
        self.leg_state(Leg::Remote)
    }

    /// State of either leg.
    #[must_use]
    pub fn leg_state(&self, leg: Leg) -> ConnectionState {
        self.shared.lock().state(leg)
    }

    /// The settings this relay was created with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("remote", &self.config.remote_address)
            .field("running", &self.is_running())
            .field("local_state", &self.local_state())
            .field("remote_state", &self.remote_state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
