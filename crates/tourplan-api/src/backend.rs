use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{CompletionRequest, CompletionResponse, MapRequest, MapResponse};

/// A concrete, type-erased handle to the planner service.
///
/// Wraps a [`PlannerBackend`] so callers never need generic parameters and
/// the handle can be cloned into spawned tasks.
#[derive(Clone)]
pub struct PlannerClient {
    inner: Arc<dyn PlannerBackend>,
}

impl PlannerClient {
    /// Wrap any backend implementation into a client.
    pub fn new(backend: impl PlannerBackend + 'static) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// Human-readable backend identifier, used in logs.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Run one chat completion for the given conversation.
    pub async fn complete(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Error> {
        self.inner.complete(token, request).await
    }

    /// Ask the map service to re-render a route at a new zoom level.
    pub async fn render_map(&self, token: &str, request: &MapRequest) -> Result<MapResponse, Error> {
        self.inner.render_map(token, request).await
    }
}

/// Trait that backend implementations provide.
///
/// Implementations must map HTTP 401 to [`Error::Unauthorized`] so callers
/// can tell an expired credential apart from every other failure.
#[async_trait]
pub trait PlannerBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Error>;

    async fn render_map(&self, token: &str, request: &MapRequest) -> Result<MapResponse, Error>;
}
