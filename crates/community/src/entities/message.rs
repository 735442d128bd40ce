use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ChannelId, MessageId, UserId};

/// Author of a message: a user id when known, always a display handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub handle: String,
}

/// A server-confirmed message in a channel.
///
/// The id is immutable once assigned; edits only change `body` and `edited_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// Local draft that exists only while a send is in flight.
///
/// It carries a temporary key and is never inserted into the message store;
/// the confirmed [`Message`] replaces it once the server answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub temp_id: String,
    pub channel_id: ChannelId,
    pub body: String,
    pub reply_to: Option<MessageId>,
    pub queued_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn new(channel_id: impl Into<ChannelId>, body: impl Into<String>) -> Self {
        Self {
            temp_id: format!("local-{}", Uuid::new_v4()),
            channel_id: channel_id.into(),
            body: body.into(),
            reply_to: None,
            queued_at: Utc::now(),
        }
    }

    pub fn replying_to(mut self, message_id: impl Into<MessageId>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}
