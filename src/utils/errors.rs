use thiserror::Error;

use crate::models::Lane;

/// Result alias used by every session-level operation
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Main error type for Parley
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider error: {domain} (status {status_code})")]
    Provider { domain: String, status_code: u16 },

    #[error("Verification error: {0}")]
    Verification(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Lane busy: {0} already has an active stream")]
    LaneBusy(Lane),

    #[error("Selection rejected: {0}")]
    Selection(String),
}

/// Coarse classification used to decide how an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    Transport,
    Verification,
    Cancellation,
    Decode,
    Usage,
}

impl ParleyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::Transport(_) | Self::Provider { .. } => ErrorKind::Transport,
            Self::Verification(_) => ErrorKind::Verification,
            Self::Cancelled(_) => ErrorKind::Cancellation,
            Self::Decode(_) => ErrorKind::Decode,
            Self::LaneBusy(_) | Self::Selection(_) => ErrorKind::Usage,
        }
    }

    /// Transport failures can be recovered by re-issuing the same request
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Cancellation is a neutral outcome and decode failures are recovered locally
    pub fn is_surfaced(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Cancellation | ErrorKind::Decode)
    }

    /// Short message suitable for the status line
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(msg) => format!("Configuration error: {}", msg),
            Self::Authentication(msg) => format!("Authorization failed: {}", msg),
            Self::Transport(msg) => format!("Streaming error: {}", msg),
            Self::Provider { domain, .. } => format!("Streaming error: {}", domain),
            Self::Verification(msg) => format!("Download Failed: {}", msg),
            Self::Cancelled(msg) => msg.clone(),
            Self::Decode(_) => String::new(),
            Self::LaneBusy(lane) => format!("{} is busy, stop it first", lane),
            Self::Selection(msg) => msg.clone(),
        }
    }
}

/// Failure reported by the external AI runtime engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{domain} ({code})")]
pub struct EngineError {
    pub domain: String,
    pub code: u16,
}

impl EngineError {
    pub fn new(domain: impl Into<String>, code: u16) -> Self {
        Self {
            domain: domain.into(),
            code,
        }
    }
}
