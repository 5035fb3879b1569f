//! One chat completion round trip: history in, exactly one terminal outcome
//! out. Nothing here returns an error to the caller.

use tourplan_api::{ChatMessage, CompletionRequest, CompletionResponse, Error, PlannerClient};

use crate::turn::{ChatTurn, map_payload};

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: u32 = 512;

pub const NO_RESPONSE_TEXT: &str = "Sorry, I could not generate a response.";
pub const MISSING_TOKEN_TEXT: &str = "No authentication token found";
const ERROR_PREFIX: &str = "Sorry, I encountered an error. ";
const GENERIC_FAILURE_TEXT: &str = "Please try again or check if the server is running.";

/// Chat request state, one per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Sending,
}

/// Terminal state of a single completion request.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Success(ChatTurn),
    /// No token was available; nothing was sent.
    MissingToken(ChatTurn),
    /// The server answered with a non-success, non-401 status, or a body we
    /// could not read.
    HttpError(ChatTurn),
    /// The request never got an answer (includes timeouts).
    NetworkError(ChatTurn),
    /// HTTP 401. Produces no turn.
    Unauthorized,
}

impl CompletionOutcome {
    pub fn into_turn(self) -> Option<ChatTurn> {
        match self {
            CompletionOutcome::Success(turn)
            | CompletionOutcome::MissingToken(turn)
            | CompletionOutcome::HttpError(turn)
            | CompletionOutcome::NetworkError(turn) => Some(turn),
            CompletionOutcome::Unauthorized => None,
        }
    }
}

/// A prepared completion request, detached from the session so it can be
/// driven on another task.
pub struct CompletionJob {
    client: PlannerClient,
    token: Option<String>,
    request: CompletionRequest,
}

impl CompletionJob {
    /// `turns` must already end with the new user turn.
    pub fn new(client: PlannerClient, token: Option<String>, turns: &[ChatTurn]) -> Self {
        Self {
            client,
            token,
            request: build_request(turns),
        }
    }

    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    pub async fn run(self) -> CompletionOutcome {
        let Some(token) = self.token.filter(|t| !t.is_empty()) else {
            tracing::warn!("chat submit without a stored token");
            return CompletionOutcome::MissingToken(error_turn(MISSING_TOKEN_TEXT));
        };

        tracing::debug!(
            backend = self.client.name(),
            messages = self.request.messages.len(),
            "sending chat request"
        );

        match self.client.complete(&token, &self.request).await {
            Ok(response) => CompletionOutcome::Success(reply_turn(response)),
            Err(Error::Unauthorized { .. }) => {
                tracing::info!("completion rejected the session token");
                CompletionOutcome::Unauthorized
            }
            Err(err @ Error::Http(_)) => {
                tracing::warn!(error = %err, "chat request failed in transport");
                CompletionOutcome::NetworkError(error_turn(&err.to_string()))
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat request failed");
                CompletionOutcome::HttpError(error_turn(&err.to_string()))
            }
        }
    }
}

/// Collapse turns to the `{role, content}` pairs the endpoint accepts.
pub fn build_request(turns: &[ChatTurn]) -> CompletionRequest {
    CompletionRequest {
        messages: turns
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect(),
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

fn reply_turn(response: CompletionResponse) -> ChatTurn {
    let content = response.first_content().unwrap_or(NO_RESPONSE_TEXT).to_string();
    let mut turn = ChatTurn::assistant(content);
    if let Some(id) = response.id.filter(|id| !id.is_empty()) {
        turn = turn.with_id(id);
    }
    if let Some(map) = map_payload(response.map_image_url, response.journey_details) {
        turn = turn.with_map(map);
    }
    turn
}

fn error_turn(message: &str) -> ChatTurn {
    let message = message.trim();
    let content = if message.is_empty() {
        format!("{ERROR_PREFIX}{GENERIC_FAILURE_TEXT}")
    } else {
        format!("{ERROR_PREFIX}Error: {message}")
    };
    ChatTurn::assistant(content)
}
