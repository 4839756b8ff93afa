//! Frame payloads passed between the two legs.
//!
//! A [`Frame`] is a plain growable byte buffer tagged with the WebSocket
//! opcode it arrived with. The relay never looks inside it.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

// ============================================================================
// FrameKind
// ============================================================================

/// WebSocket data opcode of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// UTF-8 text frame (JSON control messages).
    Text,
    /// Binary frame.
    Binary,
}

// ============================================================================
// Frame
// ============================================================================

/// One discrete message queued for transmission on a leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Vec<u8>,
}

impl Frame {
    /// Creates a text frame.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: text.into().into_bytes(),
        }
    }

    /// Creates a binary frame.
    #[inline]
    #[must_use]
    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    /// Returns the frame opcode.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Returns the raw payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text for log output.
    #[must_use]
    pub fn lossy_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Converts a received WebSocket message into a frame.
    ///
    /// Returns `None` for control messages (ping, pong, close).
    #[must_use]
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::text(text.as_str())),
            Message::Binary(data) => Some(Self::binary(data.to_vec())),
            _ => None,
        }
    }

    /// Converts the frame into a WebSocket message for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if a text frame is not valid UTF-8.
    pub fn to_message(&self) -> Result<Message> {
        match self.kind {
            FrameKind::Text => {
                let text = std::str::from_utf8(&self.payload)
                    .map_err(|e| Error::transport(format!("text frame is not UTF-8: {e}")))?;
                Ok(Message::text(text.to_owned()))
            }
            FrameKind::Binary => Ok(Message::binary(self.payload.clone())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame() {
        let frame = Frame::text(r#"{"op":1}"#);
        assert_eq!(frame.kind(), FrameKind::Text);
        assert_eq!(frame.payload(), br#"{"op":1}"#);
        assert_eq!(frame.len(), 8);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_message_conversion_keeps_opcode() {
        let frame = Frame::from_message(Message::text("hello".to_string())).expect("data frame");
        assert_eq!(frame.kind(), FrameKind::Text);
        assert!(matches!(frame.to_message(), Ok(Message::Text(t)) if t.as_str() == "hello"));

        let frame = Frame::from_message(Message::binary(vec![0u8, 1, 2])).expect("data frame");
        assert_eq!(frame.kind(), FrameKind::Binary);
        assert!(matches!(frame.to_message(), Ok(Message::Binary(b)) if b[..] == [0u8, 1, 2]));
    }

    #[test]
    fn test_control_messages_ignored() {
        assert!(Frame::from_message(Message::Ping(vec![1u8].into())).is_none());
        assert!(Frame::from_message(Message::Close(None)).is_none());
    }

    #[test]
    fn test_lossy_text() {
        let frame = Frame::binary(vec![b'o', b'k', 0xff]);
        assert_eq!(frame.lossy_text(), "ok\u{fffd}");
    }
}
