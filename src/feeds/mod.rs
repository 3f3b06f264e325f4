//! Upstream alert feeds and the per-feed polling loop.
//!
//! A feed fetches the currently active alerts as preformatted message
//! strings; the poller chunks every alert into channel-sized frames and
//! pushes them into the router. HTTP retries with exponential backoff run
//! inside the shared client middleware, so by the time a fetch error
//! reaches the poller the attempts are exhausted and the cycle is simply
//! treated as empty.

pub mod smhi;
pub mod vma;

pub use smhi::SmhiFeed;
pub use vma::VmaFeed;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    chunker::MessageChunker,
    router::{MessageSink, RouterError},
};

/// Errors raised while fetching a feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The request failed in the HTTP middleware (retries exhausted).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),

    /// The upstream answered with an error status or an undecodable body.
    #[error("upstream response error: {0}")]
    Response(#[from] reqwest::Error),
}

/// One upstream source of alert messages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertFeed: Send + Sync {
    /// Short name used in logs and task names.
    fn name(&self) -> &str;

    /// Fetches the currently active alerts as formatted message strings.
    async fn fetch(&self) -> Result<Vec<String>, FeedError>;
}

/// Drives one feed on a fixed interval and routes its alerts.
#[derive(Clone)]
pub struct FeedPoller {
    feed: Arc<dyn AlertFeed>,
    sink: Arc<dyn MessageSink>,
    chunker: MessageChunker,
    interval: Duration,
    warmup: bool,
    shutdown: CancellationToken,
}

impl FeedPoller {
    /// Creates a poller for `feed` pushing frames into `sink` every
    /// `interval`.
    ///
    /// With `warmup` set, the first cycle only marks alerts as seen, so a
    /// restart does not re-broadcast the standing snapshot.
    pub fn new(
        feed: Arc<dyn AlertFeed>,
        sink: Arc<dyn MessageSink>,
        chunker: MessageChunker,
        interval: Duration,
        warmup: bool,
        shutdown: CancellationToken,
    ) -> Self {
        Self { feed, sink, chunker, interval, warmup, shutdown }
    }

    /// Runs the polling loop until shutdown.
    ///
    /// Fetch failures are absorbed as empty cycles; routing failures (a
    /// broken transport on the immediate-send path) propagate so the
    /// restart supervisor can take over.
    pub async fn run(&self) -> Result<(), RouterError> {
        tracing::info!(feed = self.feed.name(), warmup = self.warmup, "feed poller started");
        self.poll_cycle(self.warmup).await?;
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!(feed = self.feed.name(), "feed poller stopped");
                    return Ok(());
                }

                _ = tokio::time::sleep(self.interval) => {
                    self.poll_cycle(false).await?;
                }
            }
        }
    }

    async fn poll_cycle(&self, seen_only: bool) -> Result<(), RouterError> {
        let alerts = match self.feed.fetch().await {
            Ok(alerts) => alerts,
            Err(error) => {
                tracing::error!(
                    feed = self.feed.name(),
                    error = %error,
                    "fetch failed, treating cycle as empty"
                );
                return Ok(());
            }
        };
        tracing::debug!(feed = self.feed.name(), count = alerts.len(), "fetched alerts");
        for alert in alerts {
            for frame in self.chunker.chunk(&alert) {
                self.sink.push(&frame, seen_only).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        router::DedupRouter,
        transport::{MockTransport, TransportError},
    };

    fn mock_feed(name: &'static str, alerts: Vec<String>) -> MockAlertFeed {
        let mut feed = MockAlertFeed::new();
        feed.expect_name().return_const(name.to_string());
        feed.expect_fetch().returning(move || Ok(alerts.clone()));
        feed
    }

    fn router_over(transport: MockTransport) -> DedupRouter {
        DedupRouter::new(
            Arc::new(transport),
            Duration::from_secs(3600),
            100,
            Duration::ZERO,
            "test-salt".to_string(),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_cycle_marks_seen_without_sending() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(0);
        let router = router_over(transport);
        let feed = mock_feed("test", vec!["VMA: storm warning".to_string()]);

        let poller = FeedPoller::new(
            Arc::new(feed),
            Arc::new(router.clone()),
            MessageChunker::new(200, 2),
            Duration::from_secs(60),
            true,
            CancellationToken::new(),
        );
        poller.poll_cycle(true).await.unwrap();

        // The warm-up marked the alert seen, so a later send request is a
        // no-op.
        router.request_send("VMA: storm warning").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_cycles_send_each_alert_once() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(()));
        let router = router_over(transport);
        let feed = mock_feed("test", vec!["VMA: storm warning".to_string()]);

        let poller = FeedPoller::new(
            Arc::new(feed),
            Arc::new(router),
            MessageChunker::new(200, 2),
            Duration::from_secs(60),
            false,
            CancellationToken::new(),
        );
        poller.poll_cycle(false).await.unwrap();
        poller.poll_cycle(false).await.unwrap();
        poller.poll_cycle(false).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_is_an_empty_cycle() {
        let transport = MockTransport::new();
        let router = router_over(transport);
        let mut feed = MockAlertFeed::new();
        feed.expect_name().return_const("test".to_string());
        feed.expect_fetch().returning(|| {
            Err(FeedError::Http(reqwest_middleware::Error::Middleware(
                anyhow::anyhow!("retries exhausted"),
            )))
        });

        let poller = FeedPoller::new(
            Arc::new(feed),
            Arc::new(router),
            MessageChunker::new(200, 2),
            Duration::from_secs(60),
            false,
            CancellationToken::new(),
        );
        assert!(poller.poll_cycle(false).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_propagates_to_the_supervisor_layer() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Io(std::io::Error::other("radio down"))));
        let router = router_over(transport);
        let feed = mock_feed("test", vec!["VMA: storm warning".to_string()]);

        let poller = FeedPoller::new(
            Arc::new(feed),
            Arc::new(router),
            MessageChunker::new(200, 2),
            Duration::from_secs(60),
            false,
            CancellationToken::new(),
        );
        assert!(poller.poll_cycle(false).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn long_alert_is_chunked_before_routing() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(2).returning(|_| Ok(()));
        let router = router_over(transport);
        let feed = mock_feed("test", vec!["AAAA BBBB CCCC DDDD EEEE".to_string()]);

        let poller = FeedPoller::new(
            Arc::new(feed),
            Arc::new(router),
            MessageChunker::new(20, 2),
            Duration::from_secs(60),
            false,
            CancellationToken::new(),
        );
        poller.poll_cycle(false).await.unwrap();
    }
}
