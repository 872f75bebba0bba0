use std::num::NonZeroUsize;
use std::path::Path;

use bytes::Bytes;
use reqwest::Method;
use url::Url;

use crate::config::Config;
use crate::error::ConfigError;

/// Immutable description of one benchmark run.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub method: Method,
    pub uri: Url,
    pub content_type: String,
    pub body: Bytes,
    pub concurrency: NonZeroUsize,
    pub total_requests: u64,
    pub strict: bool,
}

impl RequestPlan {
    /// Validates the parsed flags and loads the request body.
    ///
    /// The caller handles a missing `uri` before getting here; passing a
    /// config without one yields [`ConfigError::InvalidUri`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let uri = config.uri.as_deref().unwrap_or_default();
        let body = match &config.body_file {
            Some(path) => read_body(path)?,
            None => Bytes::new(),
        };

        Self::new(
            &config.method,
            uri,
            &config.content_type,
            body,
            config.concurrency,
            config.requests,
            config.strict,
        )
    }

    pub fn new(
        method: &str,
        uri: &str,
        content_type: &str,
        body: Bytes,
        concurrency: usize,
        total_requests: u64,
        strict: bool,
    ) -> Result<Self, ConfigError> {
        let concurrency = NonZeroUsize::new(concurrency).ok_or(ConfigError::ZeroConcurrency)?;
        if total_requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(method.to_string()))?;

        let uri = Url::parse(uri).map_err(|source| ConfigError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(uri.scheme().to_string()));
        }

        Ok(Self {
            method,
            uri,
            content_type: content_type.to_string(),
            body,
            concurrency,
            total_requests,
            strict,
        })
    }

    /// Concurrency that can actually be reached: never more than the number
    /// of requests in the run.
    pub fn effective_concurrency(&self) -> u64 {
        (self.concurrency.get() as u64).min(self.total_requests)
    }
}

fn read_body(path: &Path) -> Result<Bytes, ConfigError> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|source| ConfigError::ReadBody {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    fn plan(concurrency: usize, requests: u64) -> Result<RequestPlan, ConfigError> {
        RequestPlan::new(
            "POST",
            "http://localhost:8080/",
            "image/jpeg",
            Bytes::new(),
            concurrency,
            requests,
            false,
        )
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(matches!(plan(0, 10), Err(ConfigError::ZeroConcurrency)));
    }

    #[test]
    fn rejects_zero_requests() {
        assert!(matches!(plan(3, 0), Err(ConfigError::ZeroRequests)));
    }

    #[test]
    fn effective_concurrency_is_capped_by_requests() {
        assert_eq!(plan(10, 3).unwrap().effective_concurrency(), 3);
        assert_eq!(plan(2, 30).unwrap().effective_concurrency(), 2);
    }

    #[test]
    fn rejects_bad_uri() {
        let err = RequestPlan::new("GET", "not a uri", "text/plain", Bytes::new(), 1, 1, false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUri { .. }));

        let err = RequestPlan::new(
            "GET",
            "ftp://localhost/file",
            "text/plain",
            Bytes::new(),
            1,
            1,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(scheme) if scheme == "ftp"));
    }

    #[test]
    fn method_is_normalized() {
        let plan = RequestPlan::new("get", "http://localhost/", "", Bytes::new(), 1, 1, false)
            .unwrap();
        assert_eq!(plan.method, Method::GET);

        let err = RequestPlan::new("GE T", "http://localhost/", "", Bytes::new(), 1, 1, false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMethod(_)));
    }

    #[test]
    fn loads_body_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\xff\xd8\xff\xe0jpeg").unwrap();

        let path = file.path().to_str().unwrap();
        let config = Config::try_parse_from([
            "api-tester",
            "--uri",
            "http://localhost/upload",
            "-p",
            path,
        ])
        .unwrap();

        let plan = RequestPlan::from_config(&config).unwrap();
        assert_eq!(plan.body.as_ref(), b"\xff\xd8\xff\xe0jpeg");
        assert_eq!(plan.content_type, "image/jpeg");
    }

    #[test]
    fn missing_body_file_is_fatal() {
        let config = Config::try_parse_from([
            "api-tester",
            "--uri",
            "http://localhost/",
            "-p",
            "/definitely/not/here.jpg",
        ])
        .unwrap();

        assert!(matches!(
            RequestPlan::from_config(&config),
            Err(ConfigError::ReadBody { .. })
        ));
    }
}
