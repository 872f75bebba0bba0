use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "api-tester")]
#[command(about = "HTTP API load tester", long_about = None)]
pub struct Config {
    /// Uri to request, eg. http://10.9.101.194:8080/?xx=xx&xx=xx
    #[arg(long, env = "TARGET_URI")]
    pub uri: Option<String>,

    /// Http method
    #[arg(long, env = "HTTP_METHOD", default_value = "POST")]
    pub method: String,

    /// File sent as the request body
    #[arg(short = 'p', long = "body-file", env = "BODY_FILE")]
    pub body_file: Option<PathBuf>,

    /// Number of multiple requests to make at a time
    #[arg(short = 'c', long, env = "CONCURRENCY", default_value = "1")]
    pub concurrency: usize,

    /// Number of requests to perform
    #[arg(short = 'n', long = "requests", env = "REQUESTS", default_value = "1")]
    pub requests: u64,

    /// Content-Type header value
    #[arg(short = 'T', long, env = "CONTENT_TYPE", default_value = "image/jpeg")]
    pub content_type: String,

    /// Exit as soon as any request fails
    #[arg(long, env = "STRICT")]
    pub strict: bool,

    /// Per-request timeout in seconds (no timeout when unset)
    #[arg(long, env = "REQUEST_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Idle keep-alive connections kept per host
    #[arg(long, env = "MAX_IDLE_PER_HOST", default_value = "40")]
    pub max_idle_per_host: usize,

    /// Interval between progress reports in milliseconds
    #[arg(long, env = "REPORT_INTERVAL", default_value = "2000")]
    pub report_interval: u64,

    /// Interval between completion checks in milliseconds
    #[arg(long, env = "POLL_INTERVAL", default_value = "2000")]
    pub poll_interval: u64,
}

impl Config {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval.max(1))
    }
}
