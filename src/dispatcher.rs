//! Admission-control loop of a run.
//!
//! The dispatcher admits at most `N` requests in total and keeps at most `C`
//! of them in flight. Each admitted request runs on its own task. Completion
//! is detected on a fixed tick: the run is done once every admission has been
//! handed out and no concurrency slot is held anymore.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionGate, ConcurrencyLimit};
use crate::plan::RequestPlan;
use crate::reporter::Reporter;
use crate::stats::{Snapshot, StatsAggregator};
use crate::worker::RequestWorker;

const DEFAULT_TICK: Duration = Duration::from_secs(2);
const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCause {
    /// A request failed while running in strict mode.
    StrictFailure,
    /// The shutdown token was cancelled, usually by Ctrl-C.
    Interrupted,
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortCause::StrictFailure => f.write_str("request failed in strict mode"),
            AbortCause::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        snapshot: Snapshot,
        elapsed: Duration,
    },
    Aborted {
        cause: AbortCause,
        snapshot: Snapshot,
        elapsed: Duration,
    },
}

impl RunOutcome {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            RunOutcome::Completed { snapshot, .. } | RunOutcome::Aborted { snapshot, .. } => {
                snapshot
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            RunOutcome::Completed { elapsed, .. } | RunOutcome::Aborted { elapsed, .. } => *elapsed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

#[derive(Debug)]
pub struct Dispatcher {
    plan: Arc<RequestPlan>,
    client: Client,
    stats: Arc<StatsAggregator>,
    admission: AdmissionGate,
    concurrency: ConcurrencyLimit,
    poll_interval: Duration,
    report_interval: Duration,
}

impl Dispatcher {
    pub fn new(plan: RequestPlan, client: Client, stats: Arc<StatsAggregator>) -> Self {
        let admission = AdmissionGate::new(plan.total_requests);
        let concurrency = ConcurrencyLimit::new(plan.concurrency.get());

        Self {
            plan: Arc::new(plan),
            client,
            stats,
            admission,
            concurrency,
            poll_interval: DEFAULT_TICK,
            report_interval: DEFAULT_TICK,
        }
    }

    /// How often the dispatcher checks whether the run has finished.
    pub fn poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = period.max(MIN_TICK);
        self
    }

    /// How often the reporter logs progress.
    pub fn report_interval(mut self, period: Duration) -> Self {
        self.report_interval = period.max(MIN_TICK);
        self
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// Dispatches the whole plan and waits for it to finish.
    ///
    /// Cancelling `shutdown` ends the run right away with
    /// [`AbortCause::Interrupted`]. In-flight requests are abandoned in that
    /// case, as they are after a strict-mode failure.
    pub async fn run(self, shutdown: CancellationToken) -> RunOutcome {
        let start = Instant::now();

        let reporter_token = CancellationToken::new();
        let reporter = Reporter::spawn(
            Arc::clone(&self.stats),
            self.report_interval,
            reporter_token.clone(),
        );
        // Stops the reporter on every exit path.
        let reporter_guard = reporter_token.drop_guard();

        let strict_abort = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cause = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break Some(AbortCause::Interrupted),
                _ = strict_abort.cancelled() => break Some(AbortCause::StrictFailure),

                // Reap finished workers before admitting more.
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.reap(joined);
                }

                permit = self.concurrency.acquire(), if !self.admission.is_exhausted() => {
                    let Ok(permit) = permit else {
                        error!("Concurrency limit closed unexpectedly");
                        break Some(AbortCause::Interrupted);
                    };
                    if !self.admission.try_admit() {
                        continue;
                    }

                    let id = self.admission.admitted();
                    let mut worker = RequestWorker::new(
                        id,
                        self.client.clone(),
                        Arc::clone(&self.plan),
                        Arc::clone(&self.stats),
                    );
                    if self.plan.strict {
                        worker = worker.abort_on_failure(strict_abort.clone());
                    }
                    tasks.spawn(worker.run(permit));
                }

                _ = ticker.tick() => {
                    let in_flight = self.concurrency.in_flight();
                    debug!(
                        "Admitted {}/{}, in flight {}",
                        self.admission.admitted(),
                        self.admission.limit(),
                        in_flight
                    );
                    if self.admission.is_exhausted() && in_flight == 0 {
                        break None;
                    }
                }
            }
        };

        let elapsed = start.elapsed();

        match cause {
            Some(cause) => {
                warn!(
                    "Run aborted ({}), abandoning {} in-flight requests",
                    cause,
                    self.concurrency.in_flight()
                );
                tasks.abort_all();
                RunOutcome::Aborted {
                    cause,
                    snapshot: self.stats.snapshot(),
                    elapsed,
                }
            }
            None => {
                // Every slot is free, so the remaining tasks are finishing up.
                while let Some(joined) = tasks.join_next().await {
                    self.reap(joined);
                }
                drop(reporter_guard);
                reporter.await.ok();

                info!("Done");
                RunOutcome::Completed {
                    snapshot: self.stats.snapshot(),
                    elapsed,
                }
            }
        }
    }

    fn reap(&self, joined: Result<(), tokio::task::JoinError>) {
        if let Err(e) = joined {
            if e.is_panic() {
                // The worker never got to record its outcome.
                error!("Request worker panicked: {}", e);
                self.stats.record_failure();
            }
        }
    }
}
