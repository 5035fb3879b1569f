use std::path::PathBuf;

use directories::ProjectDirs;
use url::Url;

const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "tourplan";
const APP_NAME: &str = "tourplan";
const SESSION_DB_FILENAME: &str = "session.sqlite3";
const LOG_FILENAME: &str = "tourplan.log";

/// Environment variable holding the planner API base URL.
pub const API_URL_ENV: &str = "TOURPLAN_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not resolve user data directory")]
    MissingUserDataDir,

    #[error("invalid api url '{0}'")]
    InvalidApiUrl(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Runtime configuration shared by the auth client and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl Config {
    /// Build from `TOURPLAN_API_URL`, falling back to the local dev server.
    pub fn from_env() -> Result<Self> {
        match std::env::var(API_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::with_api_url(value),
            _ => Ok(Self::default()),
        }
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self> {
        let api_url = normalize_api_url(&api_url.into())?;
        Ok(Self { api_url })
    }
}

fn normalize_api_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|_| Error::InvalidApiUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidApiUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

/// App-local user data directory (for durable application state).
pub fn user_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .ok_or(Error::MissingUserDataDir)?;
    Ok(dirs.data_local_dir().to_path_buf())
}

pub fn ensure_user_data_dir() -> Result<PathBuf> {
    let dir = user_data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn session_db_path() -> Result<PathBuf> {
    Ok(ensure_user_data_dir()?.join(SESSION_DB_FILENAME))
}

pub fn log_path() -> Result<PathBuf> {
    Ok(ensure_user_data_dir()?.join(LOG_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_API_URL, Error};

    #[test]
    fn default_points_at_local_server() {
        assert_eq!(Config::default().api_url, DEFAULT_API_URL);
    }

    #[test]
    fn api_url_trailing_slash_is_dropped() {
        let config = Config::with_api_url("https://planner.example.com/").expect("valid url");
        assert_eq!(config.api_url, "https://planner.example.com");
    }

    #[test]
    fn non_http_api_url_is_rejected() {
        let err = Config::with_api_url("ftp://planner.example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidApiUrl(_)));

        let err = Config::with_api_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidApiUrl(_)));
    }
}
