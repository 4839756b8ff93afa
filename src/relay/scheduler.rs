//! Reconnection policy.
//!
//! Runs once per event loop iteration with the shared lock held. The remote
//! leg is always brought up first; the local leg follows only once the remote
//! is connected, and is dropped again as soon as the remote goes away. One
//! timestamp gates attempts on both legs.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::transport::Transport;

use super::connection::{ConnectionState, Leg};
use super::shared::Shared;

// ============================================================================
// Tick
// ============================================================================

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Tick {
    pub(crate) remote_attempted: bool,
    pub(crate) local_attempted: bool,
    pub(crate) cascaded: bool,
}

/// Returns `true` once `interval` has passed since the last attempt.
#[inline]
fn is_due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Applies the reconnection rules once.
pub(crate) fn tick(
    shared: &mut Shared,
    config: &RelayConfig,
    transport: &dyn Transport,
    now: Instant,
) -> Tick {
    let interval = config.reconnect_interval();
    let mut outcome = Tick::default();

    // Remote first.
    if !shared.state(Leg::Remote).is_active()
        && config.has_remote_address()
        && is_due(shared.last_reconnect_attempt, interval, now)
    {
        debug!("Attempting remote connection");
        shared.last_reconnect_attempt = Some(now);
        outcome.remote_attempted = true;
        // The leg records the failure; it is retried once due again.
        if let Err(e) = shared.connect(Leg::Remote, config.remote_address.trim(), transport) {
            debug!(error = %e, "Remote attempt did not start");
        }
    }

    // Local only behind a live remote.
    if shared.state(Leg::Remote) == ConnectionState::Connected
        && !shared.state(Leg::Local).is_active()
        && config.has_local_address()
        && is_due(shared.last_reconnect_attempt, interval, now)
    {
        debug!("Attempting local connection");
        shared.last_reconnect_attempt = Some(now);
        outcome.local_attempted = true;
        if let Err(e) = shared.connect(Leg::Local, config.local_address.trim(), transport) {
            debug!(error = %e, "Local attempt did not start");
        }
    }

    if shared.state(Leg::Remote) != ConnectionState::Connected
        && shared.state(Leg::Local) == ConnectionState::Connected
    {
        info!("Remote connection lost, closing local connection");
        shared.force_close(Leg::Local, transport);
        outcome.cascaded = true;
    }

    outcome
}

// ============================================================================
// Tests
// ============================================================================
