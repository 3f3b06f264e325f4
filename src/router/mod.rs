//! Cross-instance deduplication and hold-off coordination.
//!
//! The router is the coordination engine between the alert feeds and the
//! radio transport. For every distinct alert text (identified by a
//! whitespace-normalized [`Fingerprint`]) it guarantees at most one new
//! transmission per instance within the seen-cache TTL, and runs a
//! decentralized leader-election-by-timeout across all instances sharing
//! the channel: each instance draws a deterministic per-message delay from
//! its own salt, and whoever's delay elapses first transmits while the
//! others overhear the frame and cancel their own pending send.

mod delay;

pub use delay::compute_delay;

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    cache::SeenCache,
    transport::{Transport, TransportError},
};

/// Normalized deduplication key derived from an alert's text.
///
/// Whitespace runs are collapsed to single spaces, so two renditions of the
/// same alert are treated as one message regardless of source formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derives the fingerprint for `text`.
    pub fn from_text(text: &str) -> Self {
        Self(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// The normalized text. This is also exactly what goes on the air.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors surfaced by the router's send path.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The transport failed to broadcast a frame. The fingerprint is not
    /// marked seen in this case, so a later request retries the send.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Sink for alert frames produced by the feed pollers.
///
/// `push` is the single entry point the pollers use: `seen_only` marks the
/// frame as already delivered without transmitting, which is how a warm-up
/// cycle ingests the initial snapshot of long-standing alerts.
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    /// Runs the full dedup + hold-off + send path for `text`.
    async fn send_now(&self, text: &str) -> Result<(), RouterError>;

    /// Marks `text` seen without ever transmitting it.
    async fn mark_seen_only(&self, text: &str);

    /// Dispatches to [`MessageSink::mark_seen_only`] or
    /// [`MessageSink::send_now`] depending on `seen_only`.
    async fn push(&self, text: &str, seen_only: bool) -> Result<(), RouterError> {
        if seen_only {
            self.mark_seen_only(text).await;
            Ok(())
        } else {
            self.send_now(text).await
        }
    }
}

/// A send that is waiting out its hold-off delay. At most one exists per
/// fingerprint; `cancel` is fired by `mark_seen` to wake the wait early.
struct PendingSend {
    cancel: Arc<Notify>,
}

struct RouterState {
    seen: SeenCache,
    pending: HashMap<Fingerprint, PendingSend>,
}

struct RouterInner {
    state: Mutex<RouterState>,
    transport: Arc<dyn Transport>,
    hold_window: Duration,
    salt: String,
    shutdown: CancellationToken,
}

/// Cheaply clonable handle to the deduplication engine.
///
/// All state lives behind a single lock; critical sections never await, so
/// the router is safe to drive from any number of tasks.
#[derive(Clone)]
pub struct DedupRouter {
    inner: Arc<RouterInner>,
}

impl DedupRouter {
    /// Creates a router transmitting through `transport`.
    ///
    /// `salt` keys the hold-off delay for this instance; instances sharing a
    /// salt draw identical delays, instances with different salts spread
    /// out. A zero `hold_window` disables coordination entirely and sends
    /// cold fingerprints immediately.
    pub fn new(
        transport: Arc<dyn Transport>,
        seen_ttl: Duration,
        seen_capacity: usize,
        hold_window: Duration,
        salt: String,
        shutdown: CancellationToken,
    ) -> Self {
        tracing::info!(
            ttl_secs = seen_ttl.as_secs(),
            capacity = seen_capacity,
            hold_window_secs = hold_window.as_secs(),
            "dedup router initialized"
        );
        Self {
            inner: Arc::new(RouterInner {
                state: Mutex::new(RouterState {
                    seen: SeenCache::new(seen_ttl, seen_capacity),
                    pending: HashMap::new(),
                }),
                transport,
                hold_window,
                salt,
                shutdown,
            }),
        }
    }

    /// Records `text` as delivered and cancels a pending hold-off for it.
    ///
    /// This is fed both by locally confirmed transmissions and by frames
    /// overheard from other instances on the channel. Idempotent: repeated
    /// calls only refresh the seen timestamp.
    pub fn mark_seen(&self, text: &str) {
        let fingerprint = Fingerprint::from_text(text);
        let mut state = self.inner.state.lock();
        state.seen.insert(fingerprint.as_str());
        if let Some(pending) = state.pending.get(&fingerprint) {
            pending.cancel.notify_one();
        }
    }

    /// Requests transmission of `text`, deduplicating against the seen
    /// cache and any hold-off already pending for the same fingerprint.
    ///
    /// With a nonzero hold window the procedure runs in a background task
    /// and this call never blocks; transmission errors are then logged by
    /// the task. With a zero window the send happens inline and errors
    /// propagate to the caller.
    pub async fn request_send(&self, text: &str) -> Result<(), RouterError> {
        let fingerprint = Fingerprint::from_text(text);
        let signal = {
            let mut state = self.inner.state.lock();
            if state.seen.is_seen(fingerprint.as_str()) {
                tracing::debug!(fingerprint = %fingerprint, "skip: delivered within ttl");
                return Ok(());
            }
            if state.pending.contains_key(&fingerprint) {
                tracing::debug!(fingerprint = %fingerprint, "skip: hold-off already pending");
                return Ok(());
            }
            let signal = Arc::new(Notify::new());
            state
                .pending
                .insert(fingerprint.clone(), PendingSend { cancel: Arc::clone(&signal) });
            signal
        };

        if self.inner.hold_window.is_zero() {
            self.run_hold_off(fingerprint, signal).await
        } else {
            let router = self.clone();
            tokio::spawn(async move {
                if let Err(error) = router.run_hold_off(fingerprint, signal).await {
                    tracing::error!(error = %error, "hold-off transmission failed");
                }
            });
            Ok(())
        }
    }

    /// Runs the hold-off procedure once and removes the pending record on
    /// every exit path, including transport failure and shutdown.
    async fn run_hold_off(
        &self,
        fingerprint: Fingerprint,
        signal: Arc<Notify>,
    ) -> Result<(), RouterError> {
        let result = self.hold_off_and_send(&fingerprint, &signal).await;
        self.inner.state.lock().pending.remove(&fingerprint);
        result
    }

    async fn hold_off_and_send(
        &self,
        fingerprint: &Fingerprint,
        signal: &Notify,
    ) -> Result<(), RouterError> {
        if self.check_seen(fingerprint) {
            return Ok(());
        }

        let delay =
            compute_delay(fingerprint.as_str(), &self.inner.salt, self.inner.hold_window);
        if !delay.is_zero() {
            tracing::debug!(
                fingerprint = %fingerprint,
                delay_secs = delay.as_secs(),
                "holding off before transmit"
            );
            tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => {
                    tracing::debug!(fingerprint = %fingerprint, "shutdown during hold-off");
                    return Ok(());
                }
                _ = signal.notified() => {
                    tracing::info!(
                        fingerprint = %fingerprint,
                        "overheard during hold-off, send canceled"
                    );
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // The cancel signal may have landed just as the timer elapsed.
        if self.check_seen(fingerprint) {
            return Ok(());
        }

        self.inner.transport.send(fingerprint.as_str()).await?;
        self.inner.state.lock().seen.insert(fingerprint.as_str());
        tracing::info!(fingerprint = %fingerprint, "transmitted");
        Ok(())
    }

    fn check_seen(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.state.lock().seen.is_seen(fingerprint.as_str())
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }
}

#[async_trait::async_trait]
impl MessageSink for DedupRouter {
    async fn send_now(&self, text: &str) -> Result<(), RouterError> {
        self.request_send(text).await
    }

    async fn mark_seen_only(&self, text: &str) {
        self.mark_seen(text);
    }
}
