//! Confirmation-gated message sending.
//!
//! A message reaches the store only once the backend has confirmed it. When
//! the backend says the author must join the community first, the user is
//! asked for a display handle, the community is joined, and the send is
//! retried exactly once.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api::CommunityApi;
use crate::entities::{Community, Membership, Message, PendingMessage};
use crate::store::{MessageStore, StoreChange};
use crate::types::{ChannelId, CommunityError, CommunityResult, MessageId};
use crate::utils::Validator;

/// Asks the user for the display handle to join a community with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HandlePrompt: Send + Sync {
    /// `None` means the user declined to join.
    async fn request_handle(&self, community: &Community) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotMember,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
    Sent,
    Rejected(RejectReason),
}

/// What the user submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub body: String,
    pub reply_to: Option<MessageId>,
}

impl SendRequest {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            reply_to: None,
        }
    }

    pub fn reply(message_id: impl Into<MessageId>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            reply_to: Some(message_id.into()),
        }
    }
}

/// A confirmed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub message: Message,
    pub change: StoreChange,
    /// Present when the send needed a join first.
    pub joined: Option<Membership>,
}

#[derive(Debug)]
pub struct SendCoordinator {
    state: SendState,
    pending: Option<PendingMessage>,
}

impl Default for SendCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SendCoordinator {
    pub fn new() -> Self {
        Self {
            state: SendState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    /// Draft currently in flight.
    pub fn pending(&self) -> Option<&PendingMessage> {
        self.pending.as_ref()
    }

    pub fn reset(&mut self) {
        self.state = SendState::Idle;
        self.pending = None;
    }

    /// Send `request` to `channel_id` in `community`.
    ///
    /// Returns the single error to show the user when the send does not go
    /// through; nothing is appended in that case.
    pub async fn submit(
        &mut self,
        api: &dyn CommunityApi,
        prompt: &dyn HandlePrompt,
        community: &Community,
        channel_id: &str,
        request: SendRequest,
        store: &mut MessageStore,
    ) -> CommunityResult<SendOutcome> {
        let body = Validator::message_body(&request.body)?;

        let mut pending = PendingMessage::new(ChannelId::from(channel_id), body);
        pending.reply_to = request.reply_to;
        debug!(temp_id = %pending.temp_id, channel_id, "sending message");

        self.state = SendState::Sending;
        self.pending = Some(pending.clone());

        let result = match post(api, &pending).await {
            Ok(message) => Ok((message, None)),
            Err(error) if error.is_membership_required() => {
                self.state = SendState::Rejected(RejectReason::NotMember);
                info!(community_id = %community.id, "send needs membership, prompting to join");
                self.join_and_retry(api, prompt, community, &pending).await
            }
            Err(error) => Err(error),
        };

        self.pending = None;
        match result {
            Ok((message, joined)) => {
                let change = store.append(message.clone());
                self.state = SendState::Sent;
                Ok(SendOutcome {
                    message,
                    change,
                    joined,
                })
            }
            Err(error) => {
                warn!(%error, channel_id, "send rejected");
                self.state = SendState::Rejected(if error.is_membership_required() {
                    RejectReason::NotMember
                } else {
                    RejectReason::Failed
                });
                Err(error)
            }
        }
    }

    async fn join_and_retry(
        &mut self,
        api: &dyn CommunityApi,
        prompt: &dyn HandlePrompt,
        community: &Community,
        pending: &PendingMessage,
    ) -> CommunityResult<(Message, Option<Membership>)> {
        let handle = prompt
            .request_handle(community)
            .await
            .ok_or(CommunityError::JoinCancelled)?;
        let handle = Validator::display_handle(&handle)?;

        let membership = api.join_community(&community.id, &handle).await?;
        info!(community_id = %community.id, "joined community, retrying send once");

        self.state = SendState::Sending;
        let message = post(api, pending).await?;
        Ok((message, Some(membership)))
    }
}

async fn post(api: &dyn CommunityApi, pending: &PendingMessage) -> CommunityResult<Message> {
    match &pending.reply_to {
        Some(parent) => api.reply_to_message(parent, &pending.body).await,
        None => api.send_message(&pending.channel_id, &pending.body).await,
    }
}
