//! Bounded automatic restart for long-lived tasks.
//!
//! A supervised task is restarted after a fixed cooldown whenever it fails,
//! but a fixed-size rolling window of start timestamps guards against
//! masking a systemic problem: when every recorded start falls within the
//! configured interval, the task is declared crash-looping and supervision
//! stops permanently with an error.

use std::{fmt, future::Future, time::Duration};

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fixed cooldown between restart attempts.
const RESTART_COOLDOWN: Duration = Duration::from_secs(5);

/// How densely task starts may cluster before restarting is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    /// Number of start timestamps kept in the rolling window.
    pub history: usize,
    /// The window is tripped when all recorded starts are at most this old.
    pub max_interval: Duration,
}

/// Permanent failure raised when a supervised task crash-loops.
#[derive(Debug, Error)]
#[error("task '{task}' is crash-looping ({restarts} starts within {window_secs}s), last error: {reason}")]
pub struct CrashLoopError {
    task: String,
    restarts: usize,
    window_secs: u64,
    reason: String,
}

/// Rolling window of the most recent task-start timestamps. Slots begin as
/// `None` ("infinitely long ago") so the window cannot trip before it has
/// filled once.
struct RestartWindow {
    starts: Vec<Option<Instant>>,
    cursor: usize,
}

impl RestartWindow {
    fn new(capacity: usize) -> Self {
        Self { starts: vec![None; capacity.max(1)], cursor: 0 }
    }

    fn record(&mut self, now: Instant) {
        self.starts[self.cursor] = Some(now);
        self.cursor = (self.cursor + 1) % self.starts.len();
    }

    fn all_within(&self, now: Instant, interval: Duration) -> bool {
        self.starts
            .iter()
            .all(|slot| matches!(slot, Some(start) if now.duration_since(*start) <= interval))
    }

    fn len(&self) -> usize {
        self.starts.len()
    }
}

/// Repeatedly runs tasks produced by `task_factory` until one of: clean
/// completion (intentional stop), shutdown (propagates immediately, no
/// restart), or a detected crash loop (permanent error).
pub async fn supervise<F, Fut, E>(
    task_name: &str,
    policy: RestartPolicy,
    shutdown: CancellationToken,
    mut task_factory: F,
) -> Result<(), CrashLoopError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    let mut window = RestartWindow::new(policy.history);
    loop {
        window.record(Instant::now());
        let outcome = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::info!(task = task_name, "shutdown requested, stopping supervision");
                return Ok(());
            }

            outcome = task_factory() => outcome,
        };

        match outcome {
            Ok(()) => {
                tracing::info!(task = task_name, "task completed cleanly, supervision stopped");
                return Ok(());
            }
            Err(error) => {
                let now = Instant::now();
                if window.all_within(now, policy.max_interval) {
                    tracing::error!(
                        task = task_name,
                        restarts = window.len(),
                        window_secs = policy.max_interval.as_secs(),
                        error = %error,
                        "task is crash-looping, giving up"
                    );
                    return Err(CrashLoopError {
                        task: task_name.to_string(),
                        restarts: window.len(),
                        window_secs: policy.max_interval.as_secs(),
                        reason: error.to_string(),
                    });
                }
                tracing::warn!(
                    task = task_name,
                    error = %error,
                    cooldown_secs = RESTART_COOLDOWN.as_secs(),
                    "task failed, restarting after cooldown"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(RESTART_COOLDOWN) => {}
                }
            }
        }
    }
}
