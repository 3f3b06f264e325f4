//! Construction and wiring of the [`Supervisor`].

use std::{sync::Arc, time::Duration};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    feeds::AlertFeed,
    router::DedupRouter,
    transport::{Transport, UdpReceiver},
};

/// A builder for creating a `Supervisor` instance.
///
/// The builder performs the final wiring of the daemon: it resolves the
/// instance salt, constructs the dedup router over the provided transport,
/// and attaches the radio receive loop when a bound socket is supplied.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    transport: Option<Arc<dyn Transport>>,
    receiver_socket: Option<Arc<UdpSocket>>,
    feeds: Vec<(Arc<dyn AlertFeed>, Duration)>,
}

impl SupervisorBuilder {
    /// Creates a new, empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the radio transport used for all broadcasts.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attaches an already-bound multicast socket for the receive loop.
    ///
    /// Without one the daemon still transmits but never overhears, so the
    /// cross-instance cancellation path is inert; intended for tests.
    pub fn receiver_socket(mut self, socket: Arc<UdpSocket>) -> Self {
        self.receiver_socket = Some(socket);
        self
    }

    /// Registers an alert feed polled at `interval`.
    pub fn feed(mut self, feed: Arc<dyn AlertFeed>, interval: Duration) -> Self {
        self.feeds.push((feed, interval));
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let transport = self.transport.ok_or(SupervisorError::MissingTransport)?;
        if self.feeds.is_empty() {
            return Err(SupervisorError::NoFeeds);
        }

        let salt = config.dedup.instance_salt.clone().unwrap_or_else(default_instance_salt);
        tracing::info!(salt = %salt, "instance salt resolved");

        let cancellation_token = CancellationToken::new();
        let router = DedupRouter::new(
            Arc::clone(&transport),
            config.dedup.seen_ttl_secs,
            config.dedup.seen_capacity,
            config.dedup.hold_window_secs,
            salt,
            cancellation_token.clone(),
        );

        let receiver = self
            .receiver_socket
            .map(|socket| UdpReceiver::new(socket, router.clone(), cancellation_token.clone()));

        Ok(Supervisor {
            config: Arc::new(config),
            router,
            transport,
            receiver,
            feeds: self.feeds,
            cancellation_token,
            join_set: tokio::task::JoinSet::new(),
        })
    }
}

/// Locally-stable default salt: repeated runs on the same machine draw the
/// same hold-off delays.
fn default_instance_salt() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "meshwarn".to_string())
}
