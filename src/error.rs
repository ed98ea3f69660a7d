//! Error types for the market dashboard

use std::error::Error as StdError;
use thiserror::Error;

/// Errors raised by the upstream API gateway
///
/// Both variants carry plain strings so a failure can be stored in the cache
/// next to the last good data and cloned into every view model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Non-success HTTP status or network-level failure
    #[error("{message}")]
    Transport {
        /// HTTP status, absent for network-level failures
        status: Option<u16>,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Creates a Transport error for a non-success HTTP status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a Transport error for a network-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a MalformedResponse error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// HTTP status code, if the failure came with one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::MalformedResponse(_) => None,
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        Self::Transport {
            status,
            message: format!("Network error: {}", with_causes(&err)),
        }
    }
}

/// Joins an error's message with every message in its source chain
///
/// Causes already contained in the text so far are skipped.
fn with_causes(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Errors surfaced by the dashboard itself
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Page numbers are 1-based
    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    /// Unrecognised sort order string
    #[error("Unknown sort order: {0}")]
    UnknownSortOrder(String),

    /// Background task is gone
    #[error("Dashboard tracker has shut down")]
    Shutdown,
}

/// Errors installing the global tracing subscriber
#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}
