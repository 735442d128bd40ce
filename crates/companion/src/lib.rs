//! # Wellspring Companion Crate
//!
//! The AI companion chat surface. Every message the user writes and every
//! reply the companion produces passes through the crisis detector before it
//! is shown; positive signals go to the session's shared escalation handle.
//!
//! ```rust,ignore
//! use wellspring_companion::{CompanionChat, HttpReplyProvider};
//!
//! let provider = HttpReplyProvider::new(&config.companion)?;
//! let mut chat = CompanionChat::new(provider, escalation, config.companion.history_limit);
//! let exchange = chat.send("exams are stressing me out").await?;
//! ```

pub mod chat;
pub mod provider;
pub mod transcript;

use thiserror::Error;

pub use chat::{CompanionChat, CompanionExchange};
pub use provider::{HttpReplyProvider, ReplyProvider};
pub use transcript::{Role, Transcript, Turn};

/// Result type alias for companion operations
pub type CompanionResult<T> = Result<T, CompanionError>;

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("companion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid companion response: {0}")]
    Response(#[from] serde_json::Error),
    #[error("companion returned an empty reply")]
    EmptyReply,
    #[error("message cannot be empty")]
    EmptyMessage,
}

impl CompanionError {
    /// Whether sending the same message again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompanionError::Http(error) => match error.status() {
                Some(status) => status.is_server_error(),
                None => true,
            },
            CompanionError::EmptyReply => true,
            CompanionError::Response(_) | CompanionError::EmptyMessage => false,
        }
    }
}
