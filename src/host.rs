//! Host application integration.
//!
//! [`RelayHost`] owns the single [`Relay`] and maps host lifecycle hooks
//! onto it: load settings and start on load, stop on exit, recreate when
//! settings change. A [`SettingsSurface`] is whatever shows settings to the
//! user; the host only hands it the current config and a [`RelayStatus`].
//!
//! # Example
//!
//! ```no_run
//! use ws_relay::{HostEvent, JsonFileProvider, RelayHost};
//!
//! let mut host = RelayHost::new(JsonFileProvider::new("ws-relay.json"));
//! host.on_start();
//!
//! // ...
//! host.handle_event(HostEvent::Exit);
//! host.unload();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::{error, info, warn};

use crate::config::{ConfigProvider, RelayConfig};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::relay::{ConnectionState, Relay};

// ============================================================================
// Types
// ============================================================================

/// Builds a relay from settings.
pub type RelayFactory = Box<dyn Fn(RelayConfig) -> Result<Relay> + Send>;

/// Host application events the relay reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEvent {
    /// Output started.
    StreamingStarted,
    /// Output stopped.
    StreamingStopped,
    /// Host is shutting down.
    Exit,
}

// ============================================================================
// RelayStatus
// ============================================================================

/// Snapshot shown next to the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatus {
    /// A remote address is set.
    pub configured: bool,
    /// The event loop is running.
    pub running: bool,
    /// Local leg state.
    pub local: ConnectionState,
    /// Remote leg state.
    pub remote: ConnectionState,
}

impl RelayStatus {
    fn new(config: &RelayConfig, relay: Option<&Relay>) -> Self {
        Self {
            configured: config.has_remote_address(),
            running: relay.is_some_and(Relay::is_running),
            local: relay.map_or(ConnectionState::Disconnected, Relay::local_state),
            remote: relay.map_or(ConnectionState::Disconnected, Relay::remote_state),
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.configured {
            f.write_str("Status: Configured")
        } else {
            f.write_str("Status: Not configured")
        }
    }
}

// ============================================================================
// SettingsSurface
// ============================================================================

/// Something that can show relay settings to a user.
pub trait SettingsSurface: Send {
    /// Shows (or raises) the surface with fresh values.
    fn present(&mut self, config: &RelayConfig, status: &RelayStatus);

    /// Hides the surface. Does nothing by default.
    fn hide(&mut self) {}
}

// ============================================================================
// RelayHost
// ============================================================================

/// Owns the relay for the lifetime of the host.
pub struct RelayHost<P: ConfigProvider> {
    provider: P,
    config: RelayConfig,
    relay: Option<Relay>,
    factory: RelayFactory,
    surface: Option<Box<dyn SettingsSurface>>,
}

impl<P: ConfigProvider> RelayHost<P> {
    /// Creates a host whose relays use the WebSocket transport.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self::with_factory(provider, Box::new(Relay::create))
    }

    /// Creates a host with a custom relay factory.
    #[must_use]
    pub fn with_factory(provider: P, factory: RelayFactory) -> Self {
        Self {
            provider,
            config: RelayConfig::default(),
            relay: None,
            factory,
            surface: None,
        }
    }

    /// Registers the surface opened by [`on_settings_menu`](Self::on_settings_menu).
    pub fn set_settings_surface(&mut self, surface: Box<dyn SettingsSurface>) {
        self.surface = Some(surface);
    }

    /// Current settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The live relay, if one was created.
    #[inline]
    #[must_use]
    pub fn relay(&self) -> Option<&Relay> {
        self.relay.as_ref()
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> RelayStatus {
        RelayStatus::new(&self.config, self.relay.as_ref())
    }

    // ========================================================================
    // Lifecycle hooks
    // ========================================================================

    /// Loads settings, persists them back and creates the relay.
    ///
    /// The relay is started only when a remote address is configured.
    /// Returns `false` if the relay could not be created.
    pub fn on_start(&mut self) -> bool {
        info!(version = env!("CARGO_PKG_VERSION"), "WebSocket relay loaded");

        self.config = match self.provider.load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Failed to load configuration, using defaults");
                RelayConfig::default()
            }
        };

        // Writes the defaults out on first run.
        if let Err(e) = self.provider.save(&self.config) {
            warn!(error = %e, "Failed to save configuration");
        }

        self.recreate_relay()
    }

    /// Output started.
    pub fn on_stream_start(&self) {
        info!("Streaming started, relay should be active");
    }

    /// Output stopped.
    pub fn on_stream_stop(&self) {
        info!("Streaming stopped");
    }

    /// Host is exiting; stops the relay.
    pub fn on_shutdown(&self) {
        info!("Host exiting, stopping relay");
        if let Some(relay) = &self.relay {
            relay.stop();
        }
    }

    /// Routes a host event to its hook.
    pub fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::StreamingStarted => self.on_stream_start(),
            HostEvent::StreamingStopped => self.on_stream_stop(),
            HostEvent::Exit => self.on_shutdown(),
        }
    }

    /// Shows the settings surface with current values.
    pub fn on_settings_menu(&mut self) {
        let status = self.status();
        match self.surface.as_mut() {
            Some(surface) => surface.present(&self.config, &status),
            None => warn!("No settings surface registered"),
        }
    }

    /// Saves new settings and replaces the relay with one built from them.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved; the running relay
    /// is left untouched in that case.
    pub fn apply_settings(&mut self, config: RelayConfig) -> Result<()> {
        self.provider.save(&config).inspect_err(|e| {
            error!(error = %e, "Failed to save settings");
        })?;
        info!("Relay settings updated");

        self.config = config;
        self.recreate_relay();
        Ok(())
    }

    /// Checks that the configured remote address is usable.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no remote address is set
    /// - [`Error::InvalidUrl`] if it does not parse
    pub fn test_connection(&self) -> Result<Endpoint> {
        if !self.config.has_remote_address() {
            return Err(Error::config("Remote address not configured"));
        }
        Endpoint::parse(&self.config.remote_address)
    }

    /// Stops and releases the relay and the settings surface.
    pub fn unload(mut self) {
        info!("Unloading WebSocket relay");

        if let Some(mut surface) = self.surface.take() {
            surface.hide();
        }
        if let Some(relay) = self.relay.take() {
            relay.stop();
            relay.destroy();
        }

        info!("WebSocket relay unloaded");
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Drops the current relay and builds a new one from `self.config`.
    fn recreate_relay(&mut self) -> bool {
        if let Some(old) = self.relay.take() {
            old.destroy();
        }

        let relay = match (self.factory)(self.config.clone()) {
            Ok(relay) => relay,
            Err(e) => {
                error!(error = %e, "Failed to create WebSocket relay");
                return false;
            }
        };

        if self.config.has_remote_address() {
            match relay.start() {
                Ok(()) => info!("WebSocket relay started"),
                Err(e) => error!(error = %e, "Failed to start WebSocket relay"),
            }
        } else {
            info!("Remote address not configured, relay not started");
        }

        self.relay = Some(relay);
        true
    }
}

impl<P: ConfigProvider + fmt::Debug> fmt::Debug for RelayHost<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHost")
            .field("provider", &self.provider)
            .field("config", &self.config)
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
