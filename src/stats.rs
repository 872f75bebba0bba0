use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hdrhistogram::Histogram;
use tokio::sync::Mutex;

/// Sentinel for "no successful request recorded yet".
const UNSET_MIN: u64 = u64::MAX;

/// Highest latency tracked by the histogram, in microseconds.
const HISTOGRAM_MAX_US: u64 = 60_000_000;

/// Running statistics shared by all workers of a run.
///
/// Counters are plain atomics, extremes are maintained with `fetch_min` /
/// `fetch_max` so concurrent recordings can arrive in any order.
#[derive(Debug)]
pub struct StatsAggregator {
    success: AtomicU64,
    failed: AtomicU64,
    total_cost_us: AtomicU64,
    min_cost_us: AtomicU64,
    max_cost_us: AtomicU64,
    latency: Mutex<Histogram<u64>>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_cost_us: AtomicU64::new(0),
            min_cost_us: AtomicU64::new(UNSET_MIN),
            max_cost_us: AtomicU64::new(0),
            latency: Mutex::new(
                Histogram::<u64>::new_with_bounds(1, HISTOGRAM_MAX_US, 3)
                    .expect("histogram bounds are valid"),
            ),
        }
    }

    pub async fn record_success(&self, cost: Duration) {
        let cost_us = u64::try_from(cost.as_micros()).unwrap_or(u64::MAX);

        self.total_cost_us.fetch_add(cost_us, Ordering::Relaxed);
        self.min_cost_us.fetch_min(cost_us, Ordering::Relaxed);
        self.max_cost_us.fetch_max(cost_us, Ordering::Relaxed);
        self.latency.lock().await.saturating_record(cost_us);
        // Bumped last so a snapshot that sees the success also sees its cost.
        self.success.fetch_add(1, Ordering::Release);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Release);
    }

    /// Point-in-time view of the counters.
    pub fn snapshot(&self) -> Snapshot {
        let success = self.success.load(Ordering::Acquire);
        let failed = self.failed.load(Ordering::Acquire);
        let min = self.min_cost_us.load(Ordering::Relaxed);

        Snapshot {
            success,
            failed,
            total_cost_us: self.total_cost_us.load(Ordering::Relaxed),
            min_cost_us: (min != UNSET_MIN).then_some(min),
            max_cost_us: self.max_cost_us.load(Ordering::Relaxed),
        }
    }

    /// Latency percentiles of successful requests, `None` before the first
    /// success.
    pub async fn percentiles(&self) -> Option<Percentiles> {
        let hist = self.latency.lock().await;
        if hist.len() == 0 {
            return None;
        }

        Some(Percentiles {
            p50: Duration::from_micros(hist.value_at_quantile(0.50)),
            p95: Duration::from_micros(hist.value_at_quantile(0.95)),
            p99: Duration::from_micros(hist.value_at_quantile(0.99)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub success: u64,
    pub failed: u64,
    pub total_cost_us: u64,
    pub min_cost_us: Option<u64>,
    pub max_cost_us: u64,
}

impl Snapshot {
    pub fn completed(&self) -> u64 {
        self.success + self.failed
    }

    /// Successful requests per second of accumulated request time.
    pub fn qps(&self) -> Option<u64> {
        if self.success == 0 {
            return None;
        }
        (self.success * 1_000_000).checked_div(self.total_cost_us)
    }

    pub fn avg_cost(&self) -> Option<Duration> {
        self.total_cost_us
            .checked_div(self.success)
            .map(Duration::from_micros)
    }

    pub fn total_cost(&self) -> Duration {
        Duration::from_micros(self.total_cost_us)
    }

    pub fn min_cost(&self) -> Option<Duration> {
        self.min_cost_us.map(Duration::from_micros)
    }

    pub fn max_cost(&self) -> Duration {
        Duration::from_micros(self.max_cost_us)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::seq::SliceRandom;

    use super::*;

    #[test]
    fn empty_snapshot_has_no_rates() {
        let stats = StatsAggregator::new();
        let snapshot = stats.snapshot();

        assert_eq!(snapshot.success, 0);
        assert_eq!(snapshot.min_cost(), None);
        assert_eq!(snapshot.qps(), None);
        assert_eq!(snapshot.avg_cost(), None);
    }

    #[test]
    fn failures_alone_do_not_produce_rates() {
        let stats = StatsAggregator::new();
        stats.record_failure();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.completed(), 2);
        assert_eq!(snapshot.qps(), None);
    }

    #[tokio::test]
    async fn derives_qps_and_average() {
        let stats = StatsAggregator::new();
        stats.record_success(Duration::from_millis(10)).await;
        stats.record_success(Duration::from_millis(30)).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_cost(), Duration::from_millis(40));
        assert_eq!(snapshot.avg_cost(), Some(Duration::from_millis(20)));
        assert_eq!(snapshot.min_cost(), Some(Duration::from_millis(10)));
        assert_eq!(snapshot.max_cost(), Duration::from_millis(30));
        // 2 requests over 40ms of request time.
        assert_eq!(snapshot.qps(), Some(50));
    }

    #[tokio::test]
    async fn sub_microsecond_costs_do_not_divide_by_zero() {
        let stats = StatsAggregator::new();
        stats.record_success(Duration::from_nanos(300)).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success, 1);
        assert_eq!(snapshot.qps(), None);
        assert_eq!(snapshot.avg_cost(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn snapshot_is_idempotent() {
        let stats = StatsAggregator::new();
        stats.record_success(Duration::from_micros(1_500)).await;
        stats.record_failure();

        assert_eq!(stats.snapshot(), stats.snapshot());
        assert_eq!(stats.percentiles().await, stats.percentiles().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_recordings_keep_exact_extremes_and_sum() {
        let mut costs: Vec<u64> = (1..=2_000).map(|i| i * 37 % 10_007 + 1).collect();
        costs.shuffle(&mut rand::rng());

        let expected_min = *costs.iter().min().unwrap();
        let expected_max = *costs.iter().max().unwrap();
        let expected_sum: u64 = costs.iter().sum();

        let stats = Arc::new(StatsAggregator::new());
        let tasks: Vec<_> = costs
            .chunks(125)
            .map(|chunk| {
                let stats = Arc::clone(&stats);
                let chunk = chunk.to_vec();
                tokio::spawn(async move {
                    for cost in chunk {
                        stats.record_success(Duration::from_micros(cost)).await;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for result in futures_util::future::join_all(tasks).await {
            result.unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success, costs.len() as u64);
        assert_eq!(snapshot.min_cost_us, Some(expected_min));
        assert_eq!(snapshot.max_cost_us, expected_max);
        assert_eq!(snapshot.total_cost_us, expected_sum);
        assert!(snapshot.min_cost_us.unwrap() <= snapshot.max_cost_us);
    }

    #[tokio::test]
    async fn percentiles_track_distribution() {
        let stats = StatsAggregator::new();
        assert_eq!(stats.percentiles().await, None);

        for ms in 1..=100 {
            stats.record_success(Duration::from_millis(ms)).await;
        }

        let p = stats.percentiles().await.unwrap();
        assert!(p.p50 <= p.p95 && p.p95 <= p.p99);
        let p50_ms = p.p50.as_millis();
        assert!((49..=51).contains(&p50_ms), "p50 was {p50_ms}ms");
    }
}
