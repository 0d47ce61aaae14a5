//! Typed errors for the library layers.
//!
//! Binaries and glue code use `anyhow`; everything that a caller may want to
//! match on is one of the enums below.

use std::time::Duration;

use thiserror::Error;

/// Key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Model provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider stream ended unexpectedly: {0}")]
    Stream(String),
}

/// Tool execution failures. These are turned into `{ "error": … }` results
/// for the model rather than aborting the turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures talking to the gateway from a client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("rate limited by the gateway")]
    RateLimited,

    #[error("gateway returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("could not encode the request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ClientError {
    /// Classify a reqwest failure, keeping timeouts distinct from other
    /// transport errors.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }

    /// Message suitable for showing to the user in a front end.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout(after) => format!(
                "The request timed out after {} seconds. The agent may still be working; please try again.",
                after.as_secs()
            ),
            Self::RateLimited => {
                "Too many requests right now. Please wait a moment before trying again.".to_string()
            }
            Self::Status { code, .. } => {
                format!("The agent service returned an error (HTTP {code}). Please try again.")
            }
            Self::Network(_) => {
                "Could not reach the agent service. Check your connection and the gateway URL."
                    .to_string()
            }
            Self::InvalidUrl(url) => format!("The gateway URL '{url}' is not valid."),
            Self::Encode(_) => {
                "Your message could not be prepared for sending. Please try again.".to_string()
            }
        }
    }
}
