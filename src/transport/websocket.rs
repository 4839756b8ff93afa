//! tokio-tungstenite client transport.
//!
//! [`WebSocketTransport`] owns a current-thread tokio runtime. Each connect
//! spawns one task that dials the endpoint and then pumps frames between
//! the socket and a command channel. Tasks only make progress while the
//! event loop thread is inside [`Transport::service`], which keeps all
//! socket I/O on that one thread.
//!
//! # Connection Task
//!
//! - Dial with [`CONNECT_TIMEOUT`] (TLS for `wss://` via rustls)
//! - Report [`TransportEvent::Established`] or [`TransportEvent::ConnectFailed`]
//! - Forward incoming data frames as [`TransportEvent::Received`]
//! - Send queued frames; report [`TransportEvent::WriteFailed`] on error
//! - Report [`TransportEvent::Closed`] when the peer goes away

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

use super::{Frame, HandleId, Transport, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

/// Maximum time for TCP connect plus TLS and WebSocket handshakes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames a connection task may have queued before writes start failing.
const COMMAND_CAPACITY: usize = 1024;

// ============================================================================
// Types
// ============================================================================

/// Map of live handles to their connection task's command channel.
type Registry = FxHashMap<HandleId, mpsc::Sender<ConnectionCommand>>;

/// Commands for a connection task.
enum ConnectionCommand {
    /// Send one message.
    Send(Message),
    /// Close the socket and end the task.
    Close,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Client WebSocket transport backed by tokio-tungstenite.
pub struct WebSocketTransport {
    /// Runtime driving the connection tasks. Only `None` during drop.
    runtime: Option<Runtime>,
    /// Live handles.
    registry: Arc<Mutex<Registry>>,
    /// Event sender shared with connection tasks.
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    /// Event receiver drained by `service`.
    events_rx: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    /// Wakes a blocked `service` call.
    cancel: Notify,
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("handles", &self.registry.lock().len())
            .finish_non_exhaustive()
    }
}

impl WebSocketTransport {
    /// Creates the transport and its runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the runtime cannot be built.
    pub fn new() -> Result<Self> {
        // Already installed by another component is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::allocation(format!("transport runtime: {e}")))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        debug!("WebSocket transport created");

        Ok(Self {
            runtime: Some(runtime),
            registry: Arc::new(Mutex::new(Registry::default())),
            events_tx,
            events_rx: Mutex::new(events_rx),
            cancel: Notify::new(),
        })
    }

    /// Returns the number of live handles.
    #[inline]
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.registry.lock().len()
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for WebSocketTransport {
    fn connect(&self, endpoint: &Endpoint) -> Result<HandleId> {
        let runtime = self.runtime.as_ref().ok_or(Error::ConnectionClosed)?;

        let handle = HandleId::next();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        self.registry.lock().insert(handle, command_tx);

        let url = endpoint.to_url();
        debug!(%handle, url = %url, "Dialing WebSocket");

        runtime.spawn(run_connection(
            handle,
            url,
            command_rx,
            self.events_tx.clone(),
            Arc::clone(&self.registry),
        ));

        Ok(handle)
    }

    fn request_writable(&self, handle: HandleId) {
        if self.registry.lock().contains_key(&handle) {
            let _ = self.events_tx.send(TransportEvent::Writable { handle });
        }
    }

    fn write(&self, handle: HandleId, frame: &Frame) -> Result<()> {
        let message = frame.to_message()?;
        let registry = self.registry.lock();
        let command_tx = registry.get(&handle).ok_or(Error::ConnectionClosed)?;

        command_tx
            .try_send(ConnectionCommand::Send(message))
            .map_err(|e| match e {
                TrySendError::Full(_) => Error::transport("send queue full"),
                TrySendError::Closed(_) => Error::ConnectionClosed,
            })
    }

    fn close(&self, handle: HandleId) {
        if let Some(command_tx) = self.registry.lock().remove(&handle) {
            // A full queue still ends the task once the sender is dropped.
            let _ = command_tx.try_send(ConnectionCommand::Close);
            debug!(%handle, "Close requested");
        }
    }

    fn service(&self, slice: Duration) -> Vec<TransportEvent> {
        let Some(runtime) = self.runtime.as_ref() else {
            return Vec::new();
        };
        let mut events_rx = self.events_rx.lock();

        runtime.block_on(async {
            let mut events = Vec::new();

            tokio::select! {
                biased;

                _ = self.cancel.notified() => {
                    trace!("Service call cancelled");
                }

                event = events_rx.recv() => {
                    if let Some(event) = event {
                        events.push(event);
                    }
                }

                _ = sleep(slice) => {}
            }

            while let Ok(event) = events_rx.try_recv() {
                events.push(event);
            }

            events
        })
    }

    fn cancel_service(&self) {
        self.cancel.notify_one();
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.registry.lock().clear();

        // Safe to call from inside another runtime, unlike a plain drop.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }

        debug!("WebSocket transport released");
    }
}

// ============================================================================
// Connection Task
// ============================================================================

/// Dials `url` and pumps frames until the socket or the handle goes away.
async fn run_connection(
    handle: HandleId,
    url: String,
    mut command_rx: mpsc::Receiver<ConnectionCommand>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    registry: Arc<Mutex<Registry>>,
) {
    let dial = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()));
    tokio::pin!(dial);

    let ws_stream = loop {
        tokio::select! {
            result = &mut dial => {
                let reason = match result {
                    Ok(Ok((ws_stream, _response))) => break ws_stream,
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => format!(
                        "connect timed out after {}ms",
                        CONNECT_TIMEOUT.as_millis()
                    ),
                };

                warn!(%handle, url = %url, reason = %reason, "WebSocket connect failed");
                registry.lock().remove(&handle);
                let _ = events_tx.send(TransportEvent::ConnectFailed { handle, reason });
                return;
            }

            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(_)) => {
                        warn!(%handle, "Write before handshake dropped");
                    }
                    Some(ConnectionCommand::Close) | None => {
                        debug!(%handle, "Connect abandoned");
                        return;
                    }
                }
            }
        }
    };

    debug!(%handle, "WebSocket handshake complete");
    let _ = events_tx.send(TransportEvent::Established { handle });

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the peer
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Close(_))) => {
                        debug!(%handle, "WebSocket closed by peer");
                        let _ = events_tx.send(TransportEvent::Closed { handle });
                        break;
                    }

                    Some(Ok(message)) => {
                        // Ping/pong are answered by tungstenite itself
                        if let Some(frame) = Frame::from_message(message) {
                            trace!(%handle, bytes = frame.len(), "Frame received");
                            let _ = events_tx.send(TransportEvent::Received { handle, frame });
                        }
                    }

                    Some(Err(e)) => {
                        error!(%handle, error = %e, "WebSocket error");
                        let _ = events_tx.send(TransportEvent::Closed { handle });
                        break;
                    }

                    None => {
                        debug!(%handle, "WebSocket stream ended");
                        let _ = events_tx.send(TransportEvent::Closed { handle });
                        break;
                    }
                }
            }

            // Commands from the relay engine
            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(message)) => {
                        if let Err(e) = ws_write.send(message).await {
                            warn!(%handle, error = %e, "WebSocket write failed");
                            let _ = events_tx.send(TransportEvent::WriteFailed {
                                handle,
                                reason: e.to_string(),
                            });
                            break;
                        }
                        trace!(%handle, "Frame sent");
                    }

                    Some(ConnectionCommand::Close) | None => {
                        let _ = ws_write.close().await;
                        debug!(%handle, "WebSocket closed locally");
                        break;
                    }
                }
            }
        }
    }

    registry.lock().remove(&handle);
    debug!(%handle, "Connection task terminated");
}

// ============================================================================
// Tests
// ============================================================================
