//! Client abstraction for the relational endpoint.

use crate::error::WireResult;
use crate::messages::{QueryRequest, QueryResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A request/response client for the relational endpoint.
///
/// This trait abstracts the network layer so the relational adapter can
/// run against a real HTTP endpoint, an in-process server, or a test
/// double. Implementations report failures unchanged; they never retry.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Issues the lightweight reachability probe.
    async fn health(&self) -> WireResult<()>;

    /// Executes one statement.
    async fn execute(&self, request: &QueryRequest) -> WireResult<QueryResponse>;
}

#[async_trait]
impl<T: QueryClient + ?Sized> QueryClient for Arc<T> {
    async fn health(&self) -> WireResult<()> {
        (**self).health().await
    }

    async fn execute(&self, request: &QueryRequest) -> WireResult<QueryResponse> {
        (**self).execute(request).await
    }
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the endpoint (e.g., "http://127.0.0.1:8080").
    pub base_url: String,
    /// Per-request timeout, covering connect, write and read.
    pub request_timeout: Duration,
    /// Maximum accepted response body in bytes.
    pub max_response_bytes: usize,
}

impl ClientConfig {
    /// Creates a configuration for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            max_response_bytes: 16 * 1024 * 1024,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum accepted response size.
    #[must_use]
    pub fn with_max_response_bytes(mut self, bytes: usize) -> Self {
        self.max_response_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_builder() {
        let config = ClientConfig::new("http://localhost:8080")
            .with_request_timeout(Duration::from_secs(5))
            .with_max_response_bytes(1024);

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_response_bytes, 1024);
    }
}
