//! Relay engine.
//!
//! Keeps two WebSocket legs up and copies frames between them.
//!
//! # Architecture
//!
//! ```text
//!   local control API                                  remote peer
//!   ws://localhost:4455                              wss://.../ws
//!          ▲                                                ▲
//!          │ local leg                           remote leg │
//!   ┌──────┴────────────────────────────────────────────────┴──────┐
//!   │                          Relay                                │
//!   │  ┌────────────┐   received on one leg,   ┌────────────┐       │
//!   │  │ Connection │ ◄── queued on the other ─►│ Connection │       │
//!   │  └────────────┘                          └────────────┘       │
//!   │             Shared (one mutex) + event loop thread            │
//!   └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Reconnection
//!
//! The remote leg is always connected first. The local leg is connected
//! only while the remote one is up, and is closed as soon as the remote one
//! is lost. Attempts on either leg are spaced by the configured interval.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Leg state machine and outbound queue |
//! | `core` | [`Relay`] control API |
//! | `event_loop` | Service/dispatch thread |
//! | `scheduler` | Reconnection policy |
//! | `shared` | Lock-protected state and event routing |

// ============================================================================
// Submodules
// ============================================================================

mod connection;
mod core;
mod event_loop;
mod scheduler;
mod shared;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::connection::{ConnectionState, Leg};
pub use self::core::Relay;
