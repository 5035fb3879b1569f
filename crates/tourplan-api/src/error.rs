/// Errors that can occur when talking to the planner API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure: connection refused, DNS, timeout, broken body.
    #[error("{0}")]
    Http(Box<dyn std::error::Error + Send + Sync>),

    /// The server rejected the bearer token (HTTP 401).
    #[error("unauthorized: {detail}")]
    Unauthorized { detail: String },

    /// Any other non-success status. `detail` is the best human-readable
    /// text recovered from the body.
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    /// A success response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { .. } => Some(401),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(Box::new(err))
    }
}
