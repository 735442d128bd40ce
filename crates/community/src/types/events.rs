//! Realtime wire events.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Outbound frames are serialized straight from [`OutboundEvent`]. Inbound
//! frames are decoded in two steps (envelope, then payload per event name) so
//! unknown or malformed events are rejected instead of trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{ChannelId, MessageId, UserId};
use crate::entities::Message;

/// Events the client sends to the realtime broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Subscribe to a channel's room
    JoinChannel(ChannelId),
    /// Unsubscribe from a channel's room
    LeaveChannel(ChannelId),
    /// Local user started typing
    TypingStart(TypingStartPayload),
    /// Local user stopped typing
    TypingStop(TypingStopPayload),
}

impl OutboundEvent {
    pub fn typing_start(channel_id: impl Into<ChannelId>, username: impl Into<String>) -> Self {
        Self::TypingStart(TypingStartPayload {
            channel_id: channel_id.into(),
            username: username.into(),
        })
    }

    pub fn typing_stop(channel_id: impl Into<ChannelId>) -> Self {
        Self::TypingStop(TypingStopPayload {
            channel_id: channel_id.into(),
        })
    }

    pub fn channel_id(&self) -> &str {
        match self {
            OutboundEvent::JoinChannel(channel_id) | OutboundEvent::LeaveChannel(channel_id) => {
                channel_id
            }
            OutboundEvent::TypingStart(payload) => &payload.channel_id,
            OutboundEvent::TypingStop(payload) => &payload.channel_id,
        }
    }

    /// Get event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinChannel(_) => "join_channel",
            OutboundEvent::LeaveChannel(_) => "leave_channel",
            OutboundEvent::TypingStart(_) => "typing_start",
            OutboundEvent::TypingStop(_) => "typing_stop",
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStartPayload {
    pub channel_id: ChannelId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopPayload {
    pub channel_id: ChannelId,
}

/// Events the broker pushes to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message was posted
    NewMessage(Message),
    /// A message body was edited
    MessageUpdated(Message),
    /// A message was removed
    MessageDeleted(MessageDeleted),
    /// Someone in the room started typing
    UserTyping(UserTyping),
    /// Someone in the room stopped typing
    UserStopTyping(UserStopTyping),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    pub id: MessageId,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTyping {
    pub user_id: UserId,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStopTyping {
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Why an inbound frame was rejected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("invalid payload for `{event}`: {source}")]
    InvalidPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let frame: RawFrame = serde_json::from_str(text).map_err(DecodeError::Malformed)?;

        match frame.event.as_str() {
            "new_message" => payload("new_message", frame.data).map(Self::NewMessage),
            "message_updated" => payload("message_updated", frame.data).map(Self::MessageUpdated),
            "message_deleted" => payload("message_deleted", frame.data).map(Self::MessageDeleted),
            "user_typing" => payload("user_typing", frame.data).map(Self::UserTyping),
            "user_stop_typing" => payload("user_stop_typing", frame.data).map(Self::UserStopTyping),
            _ => Err(DecodeError::UnknownEvent(frame.event)),
        }
    }

    /// Channel the event belongs to, when the payload names one.
    ///
    /// Deletes and typing events may omit it; they are scoped to the single
    /// subscribed room.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            InboundEvent::NewMessage(message) | InboundEvent::MessageUpdated(message) => {
                Some(&message.channel_id)
            }
            InboundEvent::MessageDeleted(deleted) => deleted.channel_id.as_deref(),
            InboundEvent::UserTyping(typing) => typing.channel_id.as_deref(),
            InboundEvent::UserStopTyping(stop) => stop.channel_id.as_deref(),
        }
    }

    /// Get event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            InboundEvent::NewMessage(_) => "new_message",
            InboundEvent::MessageUpdated(_) => "message_updated",
            InboundEvent::MessageDeleted(_) => "message_deleted",
            InboundEvent::UserTyping(_) => "user_typing",
            InboundEvent::UserStopTyping(_) => "user_stop_typing",
        }
    }

    /// Encode back into a frame, as the broker would send it.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            InboundEvent::NewMessage(message) | InboundEvent::MessageUpdated(message) => {
                serde_json::to_value(message)?
            }
            InboundEvent::MessageDeleted(deleted) => serde_json::to_value(deleted)?,
            InboundEvent::UserTyping(typing) => serde_json::to_value(typing)?,
            InboundEvent::UserStopTyping(stop) => serde_json::to_value(stop)?,
        };

        serde_json::to_string(&serde_json::json!({
            "event": self.event_type_name(),
            "data": data,
        }))
    }
}

fn payload<T: for<'de> Deserialize<'de>>(event: &'static str, data: Value) -> Result<T, DecodeError> {
    // Payload-less frames such as `user_stop_typing()` decode as an empty object.
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };

    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload { event, source })
}
