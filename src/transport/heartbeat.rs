//! Periodic presence announcements.
//!
//! Each instance advertises itself on the channel at a long interval so
//! operators (and other mesh nodes) can see the relay is alive. Presence
//! frames are classified [`super::InboundFrame::Ignored`] on receive and
//! never reach the dedup path.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};

/// Broadcasts a presence frame every `interval` until shutdown.
///
/// Send failures are logged and the loop continues; a flaky channel must
/// not take down the heartbeat.
pub async fn run_presence_heartbeat(
    transport: Arc<dyn Transport>,
    interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), TransportError> {
    tracing::info!(interval_secs = interval.as_secs(), "presence heartbeat started");
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::info!("presence heartbeat stopped");
                return Ok(());
            }

            _ = tokio::time::sleep(interval) => {
                match transport.send_presence().await {
                    Ok(()) => tracing::debug!("presence announced"),
                    Err(error) => {
                        tracing::warn!(error = %error, "presence broadcast failed");
                    }
                }
            }
        }
    }
}
