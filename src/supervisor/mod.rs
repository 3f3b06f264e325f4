//! Lifecycle management for the relay daemon.
//!
//! The `Supervisor` owns every long-running service (the radio receive
//! loop, the presence heartbeat, and one poller per alert feed) and is
//! responsible for startup, restart policy, and graceful shutdown. It
//! listens for SIGINT/SIGTERM, watches the health of all spawned tasks,
//! and when any supervised task crash-loops it shuts the whole process
//! down rather than continuing partially functional.

mod builder;
mod restart;

pub use builder::SupervisorBuilder;
pub use restart::{CrashLoopError, RestartPolicy, supervise};

use std::sync::Arc;

use thiserror::Error;
use tokio::{signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    chunker::MessageChunker,
    config::AppConfig,
    feeds::{AlertFeed, FeedPoller},
    router::{DedupRouter, MessageSink},
    transport::{Transport, UdpReceiver, heartbeat},
};

/// Errors that can occur while assembling or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the builder.
    #[error("missing configuration for supervisor")]
    MissingConfig,

    /// A transport was not provided to the builder.
    #[error("missing transport for supervisor")]
    MissingTransport,

    /// No alert feed was registered; the daemon would have nothing to relay.
    #[error("no alert feeds registered")]
    NoFeeds,
}

/// The primary runtime manager for the daemon.
pub struct Supervisor {
    config: Arc<AppConfig>,
    router: DedupRouter,
    transport: Arc<dyn Transport>,
    receiver: Option<UdpReceiver>,
    feeds: Vec<(Arc<dyn AlertFeed>, std::time::Duration)>,
    cancellation_token: CancellationToken,
    join_set: JoinSet<()>,
}

impl Supervisor {
    /// Returns a new [`SupervisorBuilder`], the public entry point for
    /// creating a supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Starts all services and runs until shutdown.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        // Signal handler: SIGINT / SIGTERM flip the cancellation token.
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "failed to register SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT received, initiating graceful shutdown"),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown"),
            }
            cancellation_token.cancel();
        });

        let policy = RestartPolicy {
            history: self.config.restart.history,
            max_interval: self.config.restart.max_interval_secs,
        };

        // Radio receive loop: overheard frames cancel pending hold-offs.
        if let Some(receiver) = self.receiver.take() {
            self.join_set.spawn(async move {
                receiver.run().await;
            });
        }

        // Presence heartbeat.
        let transport = Arc::clone(&self.transport);
        let presence_interval = self.config.radio.presence_interval_secs;
        let heartbeat_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let outcome = supervise("heartbeat", policy, heartbeat_token.clone(), || {
                heartbeat::run_presence_heartbeat(
                    Arc::clone(&transport),
                    presence_interval,
                    heartbeat_token.clone(),
                )
            })
            .await;
            if let Err(error) = outcome {
                tracing::error!(error = %error, "heartbeat supervision gave up");
                heartbeat_token.cancel();
            }
        });

        // One supervised poller per feed.
        let sink: Arc<dyn MessageSink> = Arc::new(self.router.clone());
        let chunker =
            MessageChunker::new(self.config.radio.max_bytes, self.config.radio.max_messages);
        for (feed, interval) in self.feeds.drain(..) {
            let poller = FeedPoller::new(
                Arc::clone(&feed),
                Arc::clone(&sink),
                chunker,
                interval,
                self.config.warmup,
                self.cancellation_token.clone(),
            );
            let task_name = format!("feed:{}", feed.name());
            let feed_token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                let outcome = supervise(&task_name, policy, feed_token.clone(), || {
                    let poller = poller.clone();
                    async move { poller.run().await }
                })
                .await;
                if let Err(error) = outcome {
                    tracing::error!(error = %error, "feed supervision gave up");
                    feed_token.cancel();
                }
            });
        }

        // Watch task health until shutdown.
        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {
                            // A task finished on its own; keep watching the rest.
                        }
                        Some(Err(error)) => {
                            tracing::error!(error = %error, "a supervised task panicked, initiating shutdown");
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // Graceful drain: give the remaining tasks a bounded amount of time
        // to observe the cancellation before aborting them.
        self.cancellation_token.cancel();
        let drain = async {
            while self.join_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.config.shutdown_timeout_secs, drain).await.is_err() {
            tracing::warn!(
                timeout_secs = self.config.shutdown_timeout_secs.as_secs(),
                "tasks did not stop within the shutdown timeout, aborting the rest"
            );
            self.join_set.shutdown().await;
        }
        tracing::info!("supervisor shutdown complete");
        Ok(())
    }
}
