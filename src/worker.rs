use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::RequestError;
use crate::plan::RequestPlan;
use crate::stats::StatsAggregator;

/// Upper bound on how much of a non-200 body ends up in the error.
const MAX_ERROR_BODY: usize = 4096;

/// Performs exactly one request of a run and records its outcome.
#[derive(Debug, Clone)]
pub struct RequestWorker {
    id: u64,
    client: Client,
    plan: Arc<RequestPlan>,
    stats: Arc<StatsAggregator>,
    abort: Option<CancellationToken>,
}

impl RequestWorker {
    pub fn new(id: u64, client: Client, plan: Arc<RequestPlan>, stats: Arc<StatsAggregator>) -> Self {
        Self {
            id,
            client,
            plan,
            stats,
            abort: None,
        }
    }

    /// Token cancelled on failure, used for strict runs.
    pub fn abort_on_failure(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    /// Runs the request while holding a concurrency slot.
    ///
    /// The outcome is recorded before `permit` is dropped, so once every slot
    /// is free again all admitted requests are reflected in the stats.
    pub async fn run(self, permit: OwnedSemaphorePermit) {
        match self.execute().await {
            Ok(cost) => {
                debug!("Request {} succeeded in {:?}", self.id, cost);
                self.stats.record_success(cost).await;
            }
            Err(e) => {
                self.stats.record_failure();
                error!("Request {} failed: {}", self.id, e);
                if let Some(abort) = &self.abort {
                    abort.cancel();
                }
            }
        }
        drop(permit);
    }

    /// Issues the request and returns its latency if the server answered 200.
    pub async fn execute(&self) -> Result<Duration, RequestError> {
        let request = self
            .client
            .request(self.plan.method.clone(), self.plan.uri.clone())
            .header(CONTENT_TYPE, self.plan.content_type.as_str())
            .body(self.plan.body.clone());

        let start = Instant::now();
        let response = request.send().await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = read_bounded(response, MAX_ERROR_BODY).await;
            return Err(RequestError::Status { status, body });
        }

        // Drain the body so the connection goes back to the pool.
        response.bytes().await?;
        Ok(start.elapsed())
    }
}

async fn read_bounded(mut response: Response, limit: usize) -> String {
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) => break,
            Err(e) => {
                debug!("Failed to read error body: {}", e);
                break;
            }
        }
    }
    body.truncate(limit);
    String::from_utf8_lossy(&body).into_owned()
}
