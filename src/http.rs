//! Construction of the HTTP client shared by every worker of a run.

use std::time::Duration;

use reqwest::Client;

use crate::config::Config;
use crate::error::ConfigError;

/// Transport settings for the shared client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Option<Duration>,
    pub max_idle_per_host: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_idle_per_host: 40,
        }
    }
}

impl From<&Config> for ClientOptions {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            max_idle_per_host: config.max_idle_per_host,
        }
    }
}

/// Builds a keep-alive client. Cloning it shares the connection pool.
pub fn build_client(options: &ClientOptions) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().pool_max_idle_per_host(options.max_idle_per_host);
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
