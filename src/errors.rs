//! Typed error hierarchy for the dashboard.
//!
//! Three enums cover the three failure surfaces:
//! - `ClientError`: talking to the agent backend
//! - `ConfigError`: loading `devagent.toml`
//! - `DashboardError`: local rejections inside the synchronization core
//!
//! Client and dashboard errors never leave the core: fetches and actions log
//! them and degrade to default values or a boolean outcome.

use thiserror::Error;

/// Errors from the remote collaborator (agent backend).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot build request URL from {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
}

impl ClientError {
    /// True for failures the next poll tick may recover from.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport { .. } => true,
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::Decode { .. } | ClientError::InvalidUrl { .. } | ClientError::Setup(_) => false,
        }
    }
}

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Local rejections inside the synchronization core.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Dashboard store has been torn down")]
    StoreDisposed,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
