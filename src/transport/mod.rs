//! The radio channel boundary.
//!
//! The engine treats the channel as a collaborator: [`Transport`] performs
//! one broadcast per already-chunked frame, and the receive path classifies
//! every inbound datagram before anything reaches the dedup core. Only
//! cleanly decoded text frames matter; everything else is dropped, because
//! on a shared channel corrupt traffic is indistinguishable from noise and
//! dropping it only forfeits a cancellation opportunity.

pub mod heartbeat;
mod udp;

pub use udp::{UdpRadio, UdpReceiver};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the radio transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying socket operation failed.
    #[error("radio socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound frame could not be encoded into a wire envelope.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One-way broadcast interface to the shared channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcasts a single already-chunked text frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Broadcasts a presence announcement for this node.
    async fn send_presence(&self) -> Result<(), TransportError>;
}

/// Version tag carried by every wire envelope.
const WIRE_VERSION: u8 = 1;

/// Kind discriminator of a wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FrameKind {
    Text,
    Presence,
}

/// The JSON envelope carried in every datagram on the channel.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u8,
    node: String,
    kind: FrameKind,
    #[serde(default)]
    body: String,
}

/// Classification of one inbound datagram.
///
/// Only `Decoded` frames are handed to the router; the other variants are
/// logged at debug severity and dropped.
#[derive(Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text frame carrying the given (trimmed, non-empty) body.
    Decoded(String),
    /// A well-formed frame that is deliberately not routed.
    Ignored(&'static str),
    /// A datagram that is not valid UTF-8 or not a wire envelope.
    Malformed,
}

/// Classifies a raw datagram payload.
pub fn classify_datagram(payload: &[u8]) -> InboundFrame {
    let Ok(text) = std::str::from_utf8(payload) else {
        return InboundFrame::Malformed;
    };
    let Ok(envelope) = serde_json::from_str::<Envelope>(text) else {
        return InboundFrame::Malformed;
    };
    if envelope.v != WIRE_VERSION {
        return InboundFrame::Ignored("unsupported wire version");
    }
    match envelope.kind {
        FrameKind::Presence => InboundFrame::Ignored("presence frame"),
        FrameKind::Text => {
            let body = envelope.body.trim();
            if body.is_empty() {
                InboundFrame::Ignored("empty text body")
            } else {
                InboundFrame::Decoded(body.to_string())
            }
        }
    }
}
