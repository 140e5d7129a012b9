//! In-process routing from a [`QueryClient`] to a [`QueryServer`].

use crate::client::QueryClient;
use crate::error::{WireError, WireResult};
use crate::messages::{QueryRequest, QueryResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for endpoints that can answer relational requests in-process.
pub trait QueryServer: Send + Sync {
    /// Answers the reachability probe.
    fn health(&self) -> Result<(), String>;

    /// Executes one statement.
    fn handle_query(&self, request: &QueryRequest) -> Result<QueryResponse, String>;
}

impl<S: QueryServer + ?Sized> QueryServer for Arc<S> {
    fn health(&self) -> Result<(), String> {
        (**self).health()
    }

    fn handle_query(&self, request: &QueryRequest) -> Result<QueryResponse, String> {
        (**self).handle_query(request)
    }
}

/// A client that routes requests directly to a server in the same process.
///
/// Useful for testing without network overhead. An optional latency is
/// applied before every call, which lets tests exercise probe timeouts.
pub struct LoopbackClient<S: QueryServer> {
    server: S,
    latency: Option<Duration>,
}

impl<S: QueryServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self {
            server,
            latency: None,
        }
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns the server this client talks to.
    pub fn server(&self) -> &S {
        &self.server
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl<S: QueryServer> QueryClient for LoopbackClient<S> {
    async fn health(&self) -> WireResult<()> {
        self.delay().await;
        self.server.health().map_err(|_| WireError::Unavailable)
    }

    async fn execute(&self, request: &QueryRequest) -> WireResult<QueryResponse> {
        self.delay().await;
        self.server.handle_query(request).map_err(WireError::Query)
    }
}
