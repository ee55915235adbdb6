//! Client-side status polling as a cancellable repeating task.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};

use topichub_core::error::Result;
use topichub_core::types::Session;

use crate::lifecycle::JobTracker;

/// Anything that can answer "what is the state of this job now".
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<Session>;
}

#[async_trait]
impl StatusSource for JobTracker {
    async fn fetch(&self, job_id: &str) -> Result<Session> {
        self.status(job_id).await
    }
}

/// Handle to a running poll loop.
pub struct PollHandle {
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stops the loop. Safe to call any number of times; a response that
    /// arrives after cancellation is dropped, never published.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "poll task ended abnormally");
        }
    }
}

pub struct StatusPoller;

impl StatusPoller {
    /// Polls `job_id` every `interval` and publishes each snapshot until the
    /// job reaches a terminal state, the receiver is dropped or the handle is
    /// cancelled. Read failures are logged and retried on the next tick.
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        job_id: impl Into<String>,
        interval: Duration,
    ) -> (PollHandle, mpsc::UnboundedReceiver<Session>) {
        let job_id = job_id.into();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => break,
                    _ = ticker.tick() => {
                        let response = source.fetch(&job_id).await;
                        if *cancel_rx.borrow() {
                            break;
                        }
                        match response {
                            Ok(session) => {
                                let terminal = session.status.is_terminal();
                                if tx.send(session).is_err() || terminal {
                                    break;
                                }
                            }
                            Err(e) => tracing::debug!(job_id = %job_id, error = %e, "status poll failed; retrying"),
                        }
                    }
                }
            }
            tracing::debug!(job_id = %job_id, "status polling stopped");
        });
        (PollHandle { cancel_tx, task }, rx)
    }
}
