pub mod history;
pub mod input;
pub mod pipeline;
pub mod session;
pub mod turn;
pub mod viewport;

#[cfg(test)]
mod testing;

pub use history::History;
pub use input::{Focus, MapButton, ZoomInput, ZoomIntent};
pub use pipeline::{CompletionJob, CompletionOutcome, RequestState};
pub use session::{
    Dashboard, SessionPhase, SignOutReason, SubmitReply, SubmitResult, SubmitTicket, ZoomReply,
    ZoomResult, ZoomStart, ZoomTicket,
};
pub use turn::{ChatTurn, MapPayload, Route};
pub use viewport::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM, MapAlert, MapViewport, Viewport, ZoomSkip};
