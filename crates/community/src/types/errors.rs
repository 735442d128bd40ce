//! Error types for community chat.

use thiserror::Error;

/// Result type alias for community operations
pub type CommunityResult<T> = Result<T, CommunityError>;

/// Main error type for community chat
#[derive(Debug, Error)]
pub enum CommunityError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("You need to join this community before posting")]
    MembershipRequired,

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Realtime connection is not open")]
    NotConnected,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Join was cancelled")]
    JoinCancelled,

    #[error("No channel selected")]
    NoActiveChannel,
}

impl CommunityError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a rejection error for a non-success response
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_membership_required(&self) -> bool {
        matches!(self, Self::MembershipRequired)
    }

    /// Whether retrying the same action by hand can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Transport { .. } | Self::NotConnected => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::MembershipRequired
            | Self::NotFound { .. }
            | Self::Decode(_)
            | Self::Validation { .. }
            | Self::JoinCancelled
            | Self::NoActiveChannel => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CommunityError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}
