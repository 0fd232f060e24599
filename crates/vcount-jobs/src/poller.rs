//! Owned polling tasks for one job.
//!
//! A [`PollingSession`] is created when a job enters `Polling` and runs:
//! - the primary loop, fetching status on a fixed interval
//! - optionally the live-feed loop, on a slower interval
//!
//! Status requests are tagged with a sequence number. A response older
//! than the newest one already applied is discarded. When the job leaves
//! `Polling` the primary loop stops its interval, drops outstanding
//! requests and aborts the feed loop. Dropping or cancelling the session
//! aborts both tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{AbortHandle, JoinError, JoinHandle, JoinSet};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, Instrument};

use vcount_client::{ClientResult, JobBackend};
use vcount_models::{JobKind, JobStatus};

use crate::config::OrchestratorConfig;
use crate::logging::JobLogger;
use crate::orchestrator::Shared;

/// Running poll tasks of one job generation.
pub struct PollingSession {
    generation: u64,
    primary: JoinHandle<()>,
    feed: Option<AbortHandle>,
}

impl PollingSession {
    pub(crate) fn start(
        shared: Arc<Shared>,
        backend: Arc<dyn JobBackend>,
        config: &OrchestratorConfig,
        kind: JobKind,
        generation: u64,
        logger: JobLogger,
    ) -> Self {
        let span = logger.create_span();

        let feed = config.live_feed.then(|| {
            tokio::spawn(
                run_feed(
                    shared.clone(),
                    backend.clone(),
                    config.feed_interval,
                    kind,
                    generation,
                    logger.clone(),
                )
                .instrument(span.clone()),
            )
            .abort_handle()
        });

        let poller = StatusPoller {
            shared,
            backend,
            generation,
            logger,
            feed: feed.clone(),
            last_bucket: None,
        };
        let primary = tokio::spawn(poller.run(config.poll_interval).instrument(span));

        Self {
            generation,
            primary,
            feed,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The primary loop has exited.
    pub fn is_finished(&self) -> bool {
        self.primary.is_finished()
    }

    /// Abort both loops and any request they have in flight.
    pub fn cancel(&self) {
        self.primary.abort();
        if let Some(feed) = &self.feed {
            feed.abort();
        }
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingSession")
            .field("generation", &self.generation)
            .field("finished", &self.is_finished())
            .finish()
    }
}

enum Tick {
    Continue,
    Complete,
    Stop,
}

struct StatusPoller {
    shared: Arc<Shared>,
    backend: Arc<dyn JobBackend>,
    generation: u64,
    logger: JobLogger,
    feed: Option<AbortHandle>,
    /// Last progress decile logged
    last_bucket: Option<u8>,
}

impl StatusPoller {
    async fn run(mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: JoinSet<(u64, ClientResult<JobStatus>)> = JoinSet::new();
        let mut issued: u64 = 0;
        // Newest sequence number whose response has been applied
        let mut applied: u64 = 0;

        let outcome = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    issued += 1;
                    let seq = issued;
                    let backend = self.backend.clone();
                    in_flight.spawn(async move { (seq, backend.fetch_status().await) });
                }
                Some(joined) = in_flight.join_next() => {
                    let (seq, result) = match joined {
                        Ok(response) => response,
                        Err(e) => match self.on_join_error(e) {
                            Tick::Stop => break Tick::Stop,
                            _ => continue,
                        },
                    };
                    if seq <= applied {
                        debug!(seq, applied, "Discarding stale status response");
                        continue;
                    }
                    applied = seq;
                    match self.on_status(seq, result) {
                        Tick::Continue => {}
                        other => break other,
                    }
                }
            }
        };

        // Leaving Polling: no more ticks, no outstanding requests, no feed
        drop(ticker);
        in_flight.abort_all();
        self.stop_feed();

        if let Tick::Complete = outcome {
            self.fetch_final().await;
        }
    }

    fn stop_feed(&self) {
        if let Some(feed) = &self.feed {
            feed.abort();
        }
    }

    fn on_join_error(&self, error: JoinError) -> Tick {
        if error.is_cancelled() {
            return Tick::Continue;
        }
        self.fail(format!("status request task failed: {}", error));
        Tick::Stop
    }

    fn on_status(&mut self, seq: u64, result: ClientResult<JobStatus>) -> Tick {
        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.fail(e.to_string());
                return Tick::Stop;
            }
        };

        let applied = self.shared.update_if_current(self.generation, |state| {
            if let Some(error) = status.failure() {
                let message = error.to_string();
                state.status = Some(status);
                state.fail(message.clone());
                return (Tick::Stop, Some(message), None);
            }

            state.reconciler.apply_status(&status);
            let complete = status.is_complete();
            state.status = Some(status);
            let percent = state.progress().percent;

            if complete {
                (Tick::Complete, None, Some(percent))
            } else {
                (Tick::Continue, None, Some(percent))
            }
        });

        let Some((tick, failure, percent)) = applied else {
            // Reset or superseded while the request was in flight
            return Tick::Stop;
        };

        if let Some(message) = failure {
            self.logger.log_error(&message);
        }
        if let Some(percent) = percent {
            debug!(seq, percent, "Applied status");
            let bucket = (percent / 10.0).floor() as u8;
            if self.last_bucket != Some(bucket) {
                self.last_bucket = Some(bucket);
                self.logger.log_progress(&format!("{:.0}%", percent));
            }
        }
        tick
    }

    /// Fetch the full results exactly once after completion.
    async fn fetch_final(&self) {
        let result = self.backend.fetch_results().await;

        match result {
            Ok(payload) => {
                if let Some(error) = payload.failure() {
                    self.fail(error.to_string());
                    return;
                }
                let summary = self
                    .shared
                    .update_if_current(self.generation, |state| state.complete(&payload));
                match summary {
                    Some(summary) => self.logger.log_completion(&summary.describe()),
                    None => debug!("Final results arrived after the job was reset"),
                }
            }
            Err(e) => self.fail(format!("results fetch failed: {}", e)),
        }
    }

    fn fail(&self, message: String) {
        let applied = self
            .shared
            .update_if_current(self.generation, |state| state.fail(message.clone()));
        if applied.is_some() {
            self.logger.log_error(&message);
        }
    }
}

/// Supplementary feed loop. Failures are logged and never change the phase.
async fn run_feed(
    shared: Arc<Shared>,
    backend: Arc<dyn JobBackend>,
    period: Duration,
    kind: JobKind,
    generation: u64,
    logger: JobLogger,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match backend.fetch_live_feed(kind).await {
            Ok(feed) => {
                let applied = shared.update_if_current(generation, |state| {
                    state.reconciler.apply_feed(&feed)
                });
                if applied.is_none() {
                    break;
                }
            }
            Err(e) => logger.log_warning(&format!("live feed fetch failed: {}", e)),
        }
    }
}
