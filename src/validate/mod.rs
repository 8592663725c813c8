// ABOUTME: Post-deploy validation: synthetic HTTP checks against a stage.
// ABOUTME: Success is a 2xx response class; non-2xx or timeout fails the stage.

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::ValidationConfig;
use crate::types::StageName;

/// A validation to run against a freshly deployed stage.
#[derive(Debug)]
pub struct ValidationRequest<'a> {
    /// Public entry point of the stage, e.g. `http://dev.example.com:8080`.
    pub endpoint: &'a str,
    pub stage: &'a StageName,
    pub check: &'a ValidationConfig,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error("validation timed out after {0} seconds")]
    Timeout(u64),

    #[error("API key unavailable: {0}")]
    ApiKey(String),
}

/// Confirms a deployed stage is externally reachable and functionally
/// correct before the pipeline proceeds.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn check(&self, request: &ValidationRequest<'_>) -> Result<(), ValidationError>;
}

/// Issues `GET {endpoint}/{stage}/{path}` with an `x-api-key` header over a
/// plain http1 connection, retrying on failure up to the configured budget.
#[derive(Debug, Default)]
pub struct HttpValidator;

impl HttpValidator {
    pub fn new() -> Self {
        Self
    }

    async fn attempt(
        &self,
        authority: &str,
        path: &str,
        api_key: Option<&str>,
    ) -> Result<u16, ValidationError> {
        let stream = TcpStream::connect(authority)
            .await
            .map_err(|e| ValidationError::Unreachable(e.to_string()))?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ValidationError::Unreachable(format!("HTTP handshake failed: {}", e)))?;

        // Drive the connection in the background for the duration of the
        // request.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("validation connection error: {}", e);
            }
        });

        let mut builder = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(path)
            .header(hyper::header::HOST, authority);
        if let Some(key) = api_key {
            builder = builder.header("x-api-key", key);
        }
        let req = builder
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| ValidationError::InvalidEndpoint(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ValidationError::Unreachable(e.to_string()))?;

        let status = resp.status().as_u16();

        // Drain the body so the connection shuts down cleanly.
        let _ = resp.into_body().collect().await;

        Ok(status)
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn check(&self, request: &ValidationRequest<'_>) -> Result<(), ValidationError> {
        let authority = parse_authority(request.endpoint)?;
        let path = format!("/{}/{}", request.stage, request.check.path);

        let api_key = match &request.check.api_key {
            Some(value) => Some(
                value
                    .resolve()
                    .map_err(|e| ValidationError::ApiKey(e.to_string()))?,
            ),
            None => None,
        };

        let mut retries_remaining = request.check.retries;
        loop {
            let attempt = tokio::time::timeout(
                request.check.timeout,
                self.attempt(&authority, &path, api_key.as_deref()),
            )
            .await;

            let failure = match attempt {
                Ok(Ok(status)) if status_is_success(status) => {
                    tracing::info!(stage = %request.stage, %status, "validation passed");
                    return Ok(());
                }
                Ok(Ok(status)) => ValidationError::UnexpectedStatus(status),
                Ok(Err(e)) => e,
                Err(_elapsed) => ValidationError::Timeout(request.check.timeout.as_secs()),
            };

            if retries_remaining == 0 {
                return Err(failure);
            }
            retries_remaining -= 1;

            tracing::debug!(
                stage = %request.stage,
                "validation attempt failed ({}), retrying",
                failure
            );
            tokio::time::sleep(request.check.interval).await;
        }
    }
}

/// Extract `host:port` from an endpoint, accepting an optional `http://`
/// prefix and trailing path.
fn parse_authority(endpoint: &str) -> Result<String, ValidationError> {
    // Checks go out as plain http1. An https endpoint must be refused,
    // not stripped down to a cleartext request against port 80.
    if endpoint.starts_with("https://") {
        return Err(ValidationError::InvalidEndpoint(format!(
            "{} (https endpoints are not supported)",
            endpoint
        )));
    }

    let without_scheme = endpoint.strip_prefix("http://").unwrap_or(endpoint);

    let authority = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();

    if authority.is_empty() {
        return Err(ValidationError::InvalidEndpoint(endpoint.to_string()));
    }

    // Default port for bare hostnames.
    if authority.contains(':') {
        Ok(authority.to_string())
    } else {
        Ok(format!("{}:80", authority))
    }
}

fn status_is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_class_is_2xx_only() {
        assert!(status_is_success(200));
        assert!(status_is_success(204));
        assert!(status_is_success(299));
        assert!(!status_is_success(301));
        assert!(!status_is_success(404));
        assert!(!status_is_success(500));
        assert!(!status_is_success(199));
    }

    #[test]
    fn authority_strips_scheme_and_path() {
        assert_eq!(
            parse_authority("http://dev.example.com:8080/health").unwrap(),
            "dev.example.com:8080"
        );
        assert_eq!(
            parse_authority("dev.example.com:8080").unwrap(),
            "dev.example.com:8080"
        );
    }

    #[test]
    fn authority_defaults_port_80() {
        assert_eq!(
            parse_authority("http://dev.example.com").unwrap(),
            "dev.example.com:80"
        );
    }

    #[test]
    fn https_endpoint_is_rejected() {
        assert!(matches!(
            parse_authority("https://prod.example.com"),
            Err(ValidationError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            parse_authority("https://prod.example.com:8443/health"),
            Err(ValidationError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn empty_endpoint_is_invalid() {
        assert!(matches!(
            parse_authority(""),
            Err(ValidationError::InvalidEndpoint(_))
        ));
    }
}
