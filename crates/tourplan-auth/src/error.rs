#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("credential json parse error: {0}")]
    CredentialParse(#[from] serde_json::Error),

    #[error("session store error: {0}")]
    Store(#[from] tourplan_db::Error),

    /// Form input rejected before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The auth endpoint answered with a non-success status.
    #[error("{0}")]
    Rejected(String),

    #[error("Network error. Please check if the server is running.")]
    Network(#[source] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
