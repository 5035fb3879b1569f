//! Dashboard session: owns history, viewport and credentials for one visit.
//!
//! Network work is split in two phases so a UI loop can keep handling input
//! while a request is outstanding. `begin_*` mutates local state and hands
//! back a ticket; the ticket's `run` future does the I/O; `finish_*` applies
//! the result. The `submit` and `zoom` helpers chain all three.

use std::sync::Arc;

use parking_lot::Mutex;
use tourplan_api::PlannerClient;
use tourplan_auth::{CredentialStore, Credentials};
use tourplan_db::Store;

use crate::history::History;
use crate::input::{ZoomInput, ZoomIntent};
use crate::pipeline::{CompletionJob, CompletionOutcome, RequestState};
use crate::turn::ChatTurn;
use crate::viewport::{
    MapAlert, MapViewport, RegenerateJob, RegenerateOutcome, RegenerateResult, RegenerateStart,
    Viewport, ZoomSkip,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    User,
    /// The service rejected the token (401), or a map request had no token.
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    SignedOut(SignOutReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    /// Empty input, a request already in flight, or a signed-out session.
    Ignored,
    Appended(ChatTurn),
    SignedOut,
    /// The session was cleared or signed out while the request was in flight.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoomResult {
    Unchanged(ZoomSkip),
    Zoomed { zoom: u8 },
    Alert(MapAlert),
    SignedOut,
    Stale,
}

pub enum ZoomStart {
    Started(ZoomTicket),
    Finished(ZoomResult),
}

/// In-flight chat request.
pub struct SubmitTicket {
    job: CompletionJob,
    epoch: u64,
}

impl SubmitTicket {
    pub async fn run(self) -> SubmitReply {
        SubmitReply {
            outcome: self.job.run().await,
            epoch: self.epoch,
        }
    }
}

#[derive(Debug)]
pub struct SubmitReply {
    outcome: CompletionOutcome,
    epoch: u64,
}

/// In-flight map regeneration.
pub struct ZoomTicket {
    job: RegenerateJob,
    epoch: u64,
}

impl ZoomTicket {
    pub fn zoom(&self) -> u8 {
        self.job.zoom()
    }

    pub async fn run(self) -> ZoomReply {
        ZoomReply {
            result: self.job.run().await,
            epoch: self.epoch,
        }
    }
}

#[derive(Debug)]
pub struct ZoomReply {
    result: RegenerateResult,
    epoch: u64,
}

pub struct Dashboard {
    client: PlannerClient,
    credentials: CredentialStore,
    token: Option<String>,
    display_name: String,
    history: History,
    viewport: Viewport,
    request: RequestState,
    phase: SessionPhase,
    /// Bumped by clear and sign-out; replies from an older epoch are dropped.
    epoch: u64,
}

impl Dashboard {
    /// Restore token, name and history, and point the viewport at the most
    /// recent route found in history.
    pub fn start(
        client: PlannerClient,
        store: Arc<Mutex<Store>>,
        credentials: CredentialStore,
    ) -> Self {
        let loaded = credentials.load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to load credentials");
            Credentials::default()
        });
        let signed_in = loaded.is_authenticated();
        let display_name = loaded.display_name_or_default().to_string();
        let token = loaded.token;

        let history = History::restore(store);
        let mut viewport = Viewport::new();
        if let Some(map) = history.latest_map() {
            viewport.set_from_map(map);
        }

        tracing::info!(
            signed_in,
            turns = history.len(),
            has_route = viewport.state().route().is_some(),
            "dashboard session started"
        );

        Self {
            client,
            credentials,
            token,
            display_name,
            history,
            viewport,
            request: RequestState::Idle,
            phase: SessionPhase::Active,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_signed_out(&self) -> bool {
        matches!(self.phase, SessionPhase::SignedOut(_))
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn turns(&self) -> &[ChatTurn] {
        self.history.turns()
    }

    pub fn viewport(&self) -> &MapViewport {
        self.viewport.state()
    }

    /// Chat busy indicator.
    pub fn is_loading(&self) -> bool {
        self.request == RequestState::Sending
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Append the user turn and return the request to run, or `None` if the
    /// utterance should be ignored.
    pub fn begin_submit(&mut self, utterance: &str) -> Option<SubmitTicket> {
        let content = utterance.trim();
        if content.is_empty() || self.is_loading() || self.is_signed_out() {
            return None;
        }

        self.history.append(ChatTurn::user(content));
        self.request = RequestState::Sending;

        let job = CompletionJob::new(self.client.clone(), self.token.clone(), self.history.turns());
        Some(SubmitTicket {
            job,
            epoch: self.epoch,
        })
    }

    pub fn finish_submit(&mut self, reply: SubmitReply) -> SubmitResult {
        self.request = RequestState::Idle;
        if reply.epoch != self.epoch {
            tracing::debug!("dropping chat reply from a cleared session");
            return SubmitResult::Discarded;
        }

        let Some(turn) = reply.outcome.into_turn() else {
            self.forced_sign_out();
            return SubmitResult::SignedOut;
        };

        self.history.append(turn.clone());
        if self.viewport.set_from_turn(&turn) {
            tracing::debug!("viewport moved to a new route");
        }
        SubmitResult::Appended(turn)
    }

    pub async fn submit(&mut self, utterance: &str) -> SubmitResult {
        let Some(ticket) = self.begin_submit(utterance) else {
            return SubmitResult::Ignored;
        };
        let reply = ticket.run().await;
        self.finish_submit(reply)
    }

    // -----------------------------------------------------------------------
    // Map
    // -----------------------------------------------------------------------

    /// Single entry point for every zoom change.
    pub fn begin_zoom(&mut self, intent: ZoomIntent) -> ZoomStart {
        if self.is_signed_out() {
            return ZoomStart::Finished(ZoomResult::SignedOut);
        }
        let target = match self.viewport.plan(intent) {
            Ok(target) => target,
            Err(skip) => return ZoomStart::Finished(ZoomResult::Unchanged(skip)),
        };

        match self
            .viewport
            .begin_regenerate(target, &self.client, self.token.as_deref())
        {
            RegenerateStart::Started(job) => ZoomStart::Started(ZoomTicket {
                job,
                epoch: self.epoch,
            }),
            RegenerateStart::Skipped(skip) => ZoomStart::Finished(ZoomResult::Unchanged(skip)),
            RegenerateStart::MissingToken => {
                self.forced_sign_out();
                ZoomStart::Finished(ZoomResult::SignedOut)
            }
        }
    }

    /// Keyboard, wheel and button input all land here.
    pub fn handle_zoom_input(&mut self, input: ZoomInput) -> Option<ZoomStart> {
        input.intent().map(|intent| self.begin_zoom(intent))
    }

    pub fn finish_zoom(&mut self, reply: ZoomReply) -> ZoomResult {
        if reply.epoch != self.epoch {
            tracing::debug!("dropping map reply from a cleared session");
            self.viewport.abandon_regenerate();
            return ZoomResult::Stale;
        }

        match self.viewport.finish_regenerate(reply.result) {
            RegenerateOutcome::Applied { zoom } => ZoomResult::Zoomed { zoom },
            RegenerateOutcome::Failed(alert) => ZoomResult::Alert(alert),
            RegenerateOutcome::Stale => ZoomResult::Stale,
            RegenerateOutcome::Unauthorized => {
                self.forced_sign_out();
                ZoomResult::SignedOut
            }
        }
    }

    pub async fn zoom(&mut self, intent: ZoomIntent) -> ZoomResult {
        match self.begin_zoom(intent) {
            ZoomStart::Started(ticket) => {
                let reply = ticket.run().await;
                self.finish_zoom(reply)
            }
            ZoomStart::Finished(result) => result,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Wipe history and the map. Token and name are kept.
    pub fn clear(&mut self) {
        self.history.clear();
        self.viewport.clear();
        self.epoch += 1;
        tracing::info!("chat history cleared");
    }

    pub fn sign_out(&mut self) {
        self.sign_out_with(SignOutReason::User);
    }

    fn forced_sign_out(&mut self) {
        self.sign_out_with(SignOutReason::Unauthorized);
    }

    fn sign_out_with(&mut self, reason: SignOutReason) {
        if let Err(err) = self.credentials.clear() {
            tracing::warn!(error = %err, "failed to remove stored credentials");
        }
        self.history.clear();
        self.history.forget();
        self.viewport.clear();
        self.token = None;
        self.display_name = tourplan_auth::DEFAULT_DISPLAY_NAME.to_string();
        self.request = RequestState::Idle;
        self.epoch += 1;
        self.phase = SessionPhase::SignedOut(reason);
        tracing::info!(?reason, "signed out");
    }
}
