//! A set of helpers for testing.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transport::{Transport, TransportError};

/// A transport that records every frame it is asked to broadcast.
#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    presences: Mutex<usize>,
}

impl RecordingTransport {
    /// Creates a fresh recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All text frames broadcast so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Number of presence announcements broadcast so far.
    pub fn presence_count(&self) -> usize {
        *self.presences.lock()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        self.frames.lock().push(frame.to_string());
        Ok(())
    }

    async fn send_presence(&self) -> Result<(), TransportError> {
        *self.presences.lock() += 1;
        Ok(())
    }
}
