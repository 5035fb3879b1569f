//! reqwest-backed [`PlannerBackend`] talking JSON over HTTP.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::HttpConfig;
use crate::backend::PlannerBackend;
use crate::error::Error;
use crate::types::{CompletionRequest, CompletionResponse, MapRequest, MapResponse};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MAP_REGENERATE_PATH: &str = "/v1/maps/regenerate";
const TOKEN_LOG_PREFIX_CHARS: usize = 20;

pub(crate) struct HttpBackend {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpBackend {
    pub(crate) fn new(client: reqwest::Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    async fn post_json<B, R>(&self, path: &str, token: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(url = %url, token = %redact(token), "sending planner request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let detail = error_detail(&body_text, status);
            tracing::warn!(url = %url, status = status.as_u16(), detail = %detail, "planner request failed");
            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::Unauthorized { detail });
            }
            return Err(Error::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl PlannerBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn complete(
        &self,
        token: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Error> {
        tracing::debug!(messages = request.messages.len(), "requesting chat completion");
        self.post_json(COMPLETIONS_PATH, token, request).await
    }

    async fn render_map(&self, token: &str, request: &MapRequest) -> Result<MapResponse, Error> {
        tracing::debug!(
            origin = %request.origin,
            destination = %request.destination,
            zoom = request.zoom,
            "requesting map regeneration"
        );
        self.post_json(MAP_REGENERATE_PATH, token, request).await
    }
}

/// Pull a readable message out of an error body: `detail`, then `message`,
/// then the whole JSON document, then the raw text.
fn error_detail(body: &str, status: StatusCode) -> String {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => detail_from_json(&value),
        Err(_) => body.trim().to_string(),
    };
    if detail.is_empty() {
        return status.canonical_reason().unwrap_or("unknown error").to_string();
    }
    detail
}

fn detail_from_json(value: &serde_json::Value) -> String {
    for key in ["detail", "message"] {
        match value.get(key) {
            Some(serde_json::Value::String(text)) if !text.is_empty() => return text.clone(),
            Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    value.to_string()
}

fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_LOG_PREFIX_CHARS).collect();
    format!("{prefix}...")
}
