//! WebSocket Relay - Bridge a local control API to a remote peer.
//!
//! This library keeps two WebSocket client connections alive and copies
//! every frame received on one of them to the other, unchanged.
//!
//! # Architecture
//!
//! The relay follows a dependent two-leg model:
//!
//! - **Remote leg**: Connection to the remote peer, always established first
//! - **Local leg**: Connection to the local control API (`ws://localhost:4455`
//!   by default), established only while the remote leg is up
//!
//! Key design principles:
//!
//! - One event loop thread per [`Relay`] services both legs
//! - Frames are forwarded verbatim, text stays text and binary stays binary
//! - Losing the remote leg closes the local leg immediately
//! - Reconnect attempts use a fixed interval, no backoff
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_relay::{Relay, RelayConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let config = RelayConfig::new()
//!         .with_remote_address("wss://relay.example.com/ws")
//!         .with_reconnect_interval_secs(5);
//!
//!     let relay = Relay::create(config)?;
//!     relay.start()?;
//!
//!     // Frames now flow while both legs are connected.
//!     println!("connected: {}", relay.is_connected());
//!
//!     relay.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Settings and their persistence |
//! | [`endpoint`] | WebSocket URL parsing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host lifecycle integration |
//! | [`relay`] | Relay engine: [`Relay`], [`ConnectionState`] |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Relay settings and providers.
pub mod config;

/// WebSocket URL parsing.
pub mod endpoint;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host lifecycle integration.
pub mod host;

/// Relay engine.
///
/// Use [`Relay::create()`] to build a relay from a [`RelayConfig`].
pub mod relay;

/// WebSocket transport layer.
///
/// The [`Transport`] trait and its tokio-tungstenite implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Config types
pub use config::{ConfigProvider, JsonFileProvider, MemoryProvider, RelayConfig};

// Endpoint
pub use endpoint::Endpoint;

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{HostEvent, RelayFactory, RelayHost, RelayStatus, SettingsSurface};

// Relay types
pub use relay::{ConnectionState, Leg, Relay};

// Transport types
pub use transport::{Frame, FrameKind, HandleId, Transport, TransportEvent, WebSocketTransport};
