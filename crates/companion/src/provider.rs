//! Where companion replies come from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use wellspring_config::CompanionConfig;

use crate::transcript::{Role, Turn};
use crate::CompanionResult;

/// Produces the companion's next reply for a conversation.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    /// `history` is oldest first and ends with the user's latest message.
    async fn reply(&self, history: &[Turn]) -> CompanionResult<String>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    messages: Vec<WireTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct WireTurn<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReplyResponse {
    reply: String,
}

/// Companion backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpReplyProvider {
    client: Client,
    endpoint: String,
}

impl HttpReplyProvider {
    pub fn new(config: &CompanionConfig) -> CompanionResult<Self> {
        Self::with_timeout(
            &config.base_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> CompanionResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/reply", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ReplyProvider for HttpReplyProvider {
    async fn reply(&self, history: &[Turn]) -> CompanionResult<String> {
        let request = ReplyRequest {
            messages: history
                .iter()
                .map(|turn| WireTurn {
                    role: turn.role,
                    content: &turn.content,
                })
                .collect(),
        };
        debug!(turns = request.messages.len(), endpoint = %self.endpoint, "requesting companion reply");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed: ReplyResponse = serde_json::from_slice(&bytes)?;

        Ok(parsed.reply)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
