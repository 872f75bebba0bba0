use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Problems with the run configuration. Always fatal, raised before any
/// request is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("number of requests must be at least 1")]
    ZeroRequests,

    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    #[error("invalid uri {uri:?}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported uri scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("failed to read body file {path:?}")]
    ReadBody {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client")]
    Client(#[from] reqwest::Error),
}

/// Outcome of a single failed request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("StatusCode {}, Body {body}", .status.as_u16())]
    Status { status: StatusCode, body: String },
}
