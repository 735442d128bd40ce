//! In-process community backend for the scenario tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use wellspring_community::{
    types::MessagePageQuery, Author, Channel, ChatOptions, Community, CommunityApi, CommunityChat,
    CommunityError, CommunityResult, HandlePrompt, Identity, InboundEvent, MemoryBroker,
    Membership, Message, Page,
};
use wellspring_safety::EscalationDispatcher;

pub const USER_ID: &str = "u-1";
pub const USER_NAME: &str = "Sam";

#[derive(Default)]
struct State {
    communities: Vec<Community>,
    channels: HashMap<String, Vec<Channel>>,
    messages: HashMap<String, Vec<Message>>,
    memberships: HashMap<String, String>,
    reject_all_sends: bool,
    next_message: u64,
    send_calls: usize,
    join_calls: usize,
}

impl State {
    fn community_of(&self, channel_id: &str) -> Option<String> {
        self.channels
            .iter()
            .find(|(_, channels)| channels.iter().any(|c| c.id == channel_id))
            .map(|(community_id, _)| community_id.clone())
    }

    fn channel_of(&self, message_id: &str) -> Option<String> {
        self.messages
            .iter()
            .find(|(_, messages)| messages.iter().any(|m| m.id == message_id))
            .map(|(channel_id, _)| channel_id.clone())
    }
}

/// Backend that enforces membership on posting and broadcasts every created
/// message to the channel's room through the loopback broker.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    broker: MemoryBroker,
}

impl FakeBackend {
    /// "Study Stress" with channels General and Random, "Exam Prep", and
    /// "Quiet Room" which has no channels yet.
    pub fn new(broker: &MemoryBroker) -> Self {
        let backend = Self {
            state: Arc::new(Mutex::new(State::default())),
            broker: broker.clone(),
        };

        {
            let mut state = backend.lock();
            state.communities = vec![
                Community::new("study-stress", "Study Stress").with_category("academic"),
                Community::new("exam-prep", "Exam Prep"),
                Community::new("quiet-room", "Quiet Room"),
            ];
            state.channels.insert(
                "study-stress".to_string(),
                vec![
                    Channel::new("general", "General", "study-stress"),
                    Channel::new("random", "Random", "study-stress"),
                ],
            );
            state.channels.insert(
                "exam-prep".to_string(),
                vec![Channel::new("flashcards", "Flashcards", "exam-prep")],
            );
        }

        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn make_member(&self, community_id: &str, handle: &str) {
        self.lock()
            .memberships
            .insert(community_id.to_string(), handle.to_string());
    }

    pub fn reject_all_sends(&self) {
        self.lock().reject_all_sends = true;
    }

    pub fn send_calls(&self) -> usize {
        self.lock().send_calls
    }

    pub fn join_calls(&self) -> usize {
        self.lock().join_calls
    }

    /// Store a message as if someone else had posted it earlier.
    pub fn seed(&self, channel_id: &str, id: &str, body: &str) -> Message {
        let message = message(id, channel_id, "Kit", body);
        self.lock()
            .messages
            .entry(channel_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    fn post(&self, channel_id: &str, body: &str, reply_to: Option<String>) -> CommunityResult<Message> {
        let message = {
            let mut state = self.lock();
            state.send_calls += 1;

            let community_id = state
                .community_of(channel_id)
                .ok_or_else(|| CommunityError::not_found(format!("channel {channel_id}")))?;
            let handle = match state.memberships.get(&community_id) {
                Some(handle) if !state.reject_all_sends => handle.clone(),
                _ => return Err(CommunityError::MembershipRequired),
            };

            state.next_message += 1;
            let mut message = message(
                &format!("srv-{}", state.next_message),
                channel_id,
                &handle,
                body,
            );
            message.author.user_id = Some(USER_ID.to_string());
            message.reply_to = reply_to;
            state
                .messages
                .entry(channel_id.to_string())
                .or_default()
                .push(message.clone());
            message
        };

        self.broker
            .publish(channel_id, InboundEvent::NewMessage(message.clone()));
        Ok(message)
    }
}

pub fn message(id: &str, channel_id: &str, handle: &str, body: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        author: Author {
            user_id: Some(format!("u-{}", handle.to_lowercase())),
            handle: handle.to_string(),
        },
        body: body.to_string(),
        created_at: Utc::now(),
        edited_at: None,
        reply_to: None,
    }
}

#[async_trait]
impl CommunityApi for FakeBackend {
    async fn list_communities(&self, page: u32) -> CommunityResult<Page<Community>> {
        Ok(Page::new(self.lock().communities.clone(), page, false))
    }

    async fn get_community(&self, community_id: &str) -> CommunityResult<Community> {
        self.lock()
            .communities
            .iter()
            .find(|c| c.id == community_id)
            .cloned()
            .ok_or_else(|| CommunityError::not_found(format!("community {community_id}")))
    }

    async fn join_community(&self, community_id: &str, handle: &str) -> CommunityResult<Membership> {
        let mut state = self.lock();
        state.join_calls += 1;
        state
            .memberships
            .insert(community_id.to_string(), handle.to_string());
        Ok(Membership {
            community_id: community_id.to_string(),
            handle: handle.to_string(),
        })
    }

    async fn leave_community(&self, community_id: &str) -> CommunityResult<()> {
        self.lock().memberships.remove(community_id);
        Ok(())
    }

    async fn list_channels(&self, community_id: &str) -> CommunityResult<Vec<Channel>> {
        Ok(self
            .lock()
            .channels
            .get(community_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_messages(
        &self,
        channel_id: &str,
        query: MessagePageQuery,
    ) -> CommunityResult<Page<Message>> {
        let state = self.lock();
        let all = state.messages.get(channel_id).cloned().unwrap_or_default();
        let newest_first: Vec<Message> = all
            .into_iter()
            .rev()
            .take(query.limit as usize)
            .collect();
        Ok(Page::new(newest_first, query.page, false))
    }

    async fn send_message(&self, channel_id: &str, body: &str) -> CommunityResult<Message> {
        self.post(channel_id, body, None)
    }

    async fn edit_message(&self, message_id: &str, body: &str) -> CommunityResult<Message> {
        let edited = {
            let mut state = self.lock();
            let channel_id = state
                .channel_of(message_id)
                .ok_or_else(|| CommunityError::not_found(format!("message {message_id}")))?;
            let messages = state.messages.entry(channel_id).or_default();
            let Some(message) = messages.iter_mut().find(|m| m.id == message_id) else {
                return Err(CommunityError::not_found(format!("message {message_id}")));
            };
            message.body = body.to_string();
            message.edited_at = Some(Utc::now());
            message.clone()
        };

        self.broker
            .publish(&edited.channel_id, InboundEvent::MessageUpdated(edited.clone()));
        Ok(edited)
    }

    async fn delete_message(&self, message_id: &str) -> CommunityResult<()> {
        let mut state = self.lock();
        if let Some(channel_id) = state.channel_of(message_id) {
            if let Some(messages) = state.messages.get_mut(&channel_id) {
                messages.retain(|m| m.id != message_id);
            }
        }
        Ok(())
    }

    async fn reply_to_message(&self, message_id: &str, body: &str) -> CommunityResult<Message> {
        let channel_id = self
            .lock()
            .channel_of(message_id)
            .ok_or_else(|| CommunityError::not_found(format!("message {message_id}")))?;
        self.post(&channel_id, body, Some(message_id.to_string()))
    }
}

/// Prompt that always answers with the same handle (or always declines).
pub struct FixedHandle {
    handle: Option<String>,
    asked: Mutex<usize>,
}

impl FixedHandle {
    pub fn answering(handle: &str) -> Self {
        Self {
            handle: Some(handle.to_string()),
            asked: Mutex::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            handle: None,
            asked: Mutex::new(0),
        }
    }

    pub fn times_asked(&self) -> usize {
        *self.asked.lock().unwrap()
    }
}

#[async_trait]
impl HandlePrompt for FixedHandle {
    async fn request_handle(&self, _community: &Community) -> Option<String> {
        *self.asked.lock().unwrap() += 1;
        self.handle.clone()
    }
}

pub struct Harness {
    pub broker: MemoryBroker,
    pub backend: FakeBackend,
    pub prompt: Arc<FixedHandle>,
    pub escalation: EscalationDispatcher,
    pub chat: CommunityChat,
}

impl Harness {
    pub fn new(prompt: FixedHandle) -> Self {
        Self::with_identity(prompt, Identity::user(USER_ID, USER_NAME))
    }

    pub fn with_identity(prompt: FixedHandle, identity: Identity) -> Self {
        let broker = MemoryBroker::new();
        let backend = FakeBackend::new(&broker);
        let prompt = Arc::new(prompt);
        let escalation = EscalationDispatcher::new();

        let chat = CommunityChat::new(
            Arc::new(backend.clone()),
            Arc::new(broker.clone()),
            prompt.clone(),
            identity,
            escalation.clone(),
            ChatOptions::default(),
        );

        Self {
            broker,
            backend,
            prompt,
            escalation,
            chat,
        }
    }

    pub fn rooms(&self) -> Vec<String> {
        self.broker.subscribed_rooms().into_iter().collect()
    }

    /// Pull every event already queued for the chat and apply it.
    pub async fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), self.chat.next_event()).await
        {
            if self.chat.handle_event(event, tokio::time::Instant::now()) {
                applied += 1;
            }
        }
        applied
    }
}
