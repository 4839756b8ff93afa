//! Dedicated relay thread.
//!
//! Each iteration services the transport for one slice without the lock,
//! then takes the lock to dispatch what arrived and run one scheduler tick.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::RelayConfig;
use crate::transport::Transport;

use super::scheduler;
use super::shared::Shared;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on one transport service call.
pub(crate) const SERVICE_SLICE: Duration = Duration::from_millis(50);

const THREAD_NAME: &str = "ws-relay-loop";

// ============================================================================
// EventLoop
// ============================================================================

/// Everything the loop thread owns.
pub(crate) struct EventLoop {
    pub(crate) config: Arc<RelayConfig>,
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) running: Arc<AtomicBool>,
}

impl EventLoop {
    /// Starts the loop on its own thread.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        debug!("Event loop started");

        while self.running.load(Ordering::Acquire) {
            let events = self.transport.service(SERVICE_SLICE);

            let mut shared = self.shared.lock();

            // stop() may have closed both legs while we were servicing.
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            if !events.is_empty() {
                trace!(count = events.len(), "Dispatching transport events");
            }
            for event in events {
                shared.dispatch(event, self.transport.as_ref(), self.config.verbose_logging);
            }

            scheduler::tick(
                &mut shared,
                &self.config,
                self.transport.as_ref(),
                Instant::now(),
            );
        }

        debug!("Event loop exited");
    }
}
