use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::stats::{Percentiles, Snapshot, StatsAggregator};

/// Periodically logs the running statistics until its token is cancelled.
#[derive(Debug)]
pub struct Reporter {
    stats: Arc<StatsAggregator>,
    period: Duration,
}

impl Reporter {
    pub fn new(stats: Arc<StatsAggregator>, period: Duration) -> Self {
        Self { stats, period }
    }

    pub fn spawn(
        stats: Arc<StatsAggregator>,
        period: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::new(stats, period).run(token))
    }

    pub async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately, there is nothing to report yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(line) = progress_line(&self.stats.snapshot()) {
                        info!("{}", line);
                    }
                }
            }
        }
    }
}

/// One progress report, `None` while nothing has succeeded yet.
pub fn progress_line(snapshot: &Snapshot) -> Option<String> {
    if snapshot.success == 0 {
        return None;
    }

    Some(format!(
        "QPS {} TotalCost {:?} AvgCost {:?} MaxCost {:?} MinCost {:?} Success {} Failed {}",
        snapshot.qps().unwrap_or(0),
        snapshot.total_cost(),
        snapshot.avg_cost().unwrap_or_default(),
        snapshot.max_cost(),
        snapshot.min_cost().unwrap_or_default(),
        snapshot.success,
        snapshot.failed,
    ))
}

pub fn print_summary(snapshot: &Snapshot, percentiles: Option<Percentiles>, elapsed: Duration) {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║                    BENCHMARK SUMMARY                       ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    info!("");
    info!("Requests:");
    info!("  Success:    {}", snapshot.success);
    info!("  Failed:     {}", snapshot.failed);
    info!("  Elapsed:    {:.2?}", elapsed);
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        info!("  Throughput: {:.2} req/s", snapshot.success as f64 / secs);
    }

    info!("");
    info!("Latency:");
    if snapshot.success > 0 {
        match snapshot.qps() {
            Some(qps) => info!("  QPS:    {}", qps),
            None => info!("  QPS:    n/a"),
        }
        info!("  Total:  {:?}", snapshot.total_cost());
        info!("  Min:    {:?}", snapshot.min_cost().unwrap_or_default());
        info!("  Avg:    {:?}", snapshot.avg_cost().unwrap_or_default());
        if let Some(p) = percentiles {
            info!("  p50:    {:?}", p.p50);
            info!("  p95:    {:?}", p.p95);
            info!("  p99:    {:?}", p.p99);
        }
        info!("  Max:    {:?}", snapshot.max_cost());
    } else {
        info!("  No data");
    }

    info!("");
    info!("═══════════════════════════════════════════════════════════");
}
