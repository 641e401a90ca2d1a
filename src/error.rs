use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CrawlError {
    #[error("invalid plate: {0}")]
    InvalidPlate(String),

    #[error("city not found in registry: {0}")]
    CityNotFound(String),

    #[error("failed to read city registry at {0}")]
    RegistryRead(PathBuf),

    #[error("failed to parse city registry: {0}")]
    RegistryParse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("max retries reached for {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("unexpected payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("request limiter closed")]
    LimiterClosed,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read input: {0}")]
    Prompt(String),
}

impl CrawlError {
    /// URL of the remote resource that caused the failure, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            CrawlError::Transport { url, .. }
            | CrawlError::Status { url, .. }
            | CrawlError::RetriesExhausted { url, .. }
            | CrawlError::Payload { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            CrawlError::Transport { .. }
                | CrawlError::Status { .. }
                | CrawlError::RetriesExhausted { .. }
                | CrawlError::Payload { .. }
        )
    }

    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            CrawlError::CityNotFound(_) | CrawlError::InvalidPlate(_)
        )
    }
}
