//! # tourplan-api
//!
//! Contract between the dashboard and the planner service: the wire types
//! for chat completions and map regeneration, the [`PlannerBackend`] trait,
//! and a reqwest implementation of it.
//!
//! ```ignore
//! let client = tourplan_api::http(HttpConfig {
//!     base_url: "http://localhost:8000".into(),
//! });
//! let response = client.complete(&token, &request).await?;
//! ```

pub mod backend;
pub mod error;
mod http;
pub mod types;

pub use backend::{PlannerBackend, PlannerClient};
pub use error::Error;
pub use types::{
    ChatMessage, Choice, ChoiceMessage, CompletionRequest, CompletionResponse, JourneyDetails,
    MapRequest, MapResponse, Role,
};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Configuration for the HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Scheme, host and optional port, without a trailing slash.
    pub base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
        }
    }
}

/// Create a planner client that talks to the service over HTTP.
pub fn http(config: HttpConfig) -> PlannerClient {
    PlannerClient::new(http::HttpBackend::new(reqwest::Client::new(), config))
}
