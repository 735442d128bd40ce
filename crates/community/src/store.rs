//! Per-channel message cache.
//!
//! The store holds the confirmed messages of exactly one channel in arrival
//! order. Arrival order is the only ordering; nothing is re-sorted by
//! timestamp. Message ids are unique within the store.

use tracing::debug;

use crate::entities::Message;
use crate::types::{ChannelId, MessageId};

/// Outcome of a store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Appended(MessageId),
    Replaced(MessageId),
    Removed(MessageId),
    /// Nothing changed: unknown id, duplicate delete, or a foreign channel.
    Ignored,
}

impl StoreChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, StoreChange::Ignored)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    channel_id: Option<ChannelId>,
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_channel(channel_id: impl Into<ChannelId>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            messages: Vec::new(),
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// Clear the cache and rebind it to another channel.
    pub fn reset(&mut self, channel_id: Option<ChannelId>) {
        self.messages.clear();
        self.channel_id = channel_id;
    }

    fn accepts(&self, message: &Message) -> bool {
        self.channel_id.as_deref() == Some(message.channel_id.as_str())
    }

    fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Add a message at the end. A message whose id is already cached replaces
    /// the cached copy where it stands.
    pub fn append(&mut self, message: Message) -> StoreChange {
        if !self.accepts(&message) {
            debug!(
                message_id = %message.id,
                channel_id = %message.channel_id,
                "dropping message for another channel"
            );
            return StoreChange::Ignored;
        }

        let id = message.id.clone();
        match self.position(&id) {
            Some(index) => {
                self.messages[index] = message;
                StoreChange::Replaced(id)
            }
            None => {
                self.messages.push(message);
                StoreChange::Appended(id)
            }
        }
    }

    /// Swap the cached copy of `message_id`. Unknown ids are ignored.
    pub fn replace(&mut self, message_id: &str, message: Message) -> StoreChange {
        if !self.accepts(&message) {
            return StoreChange::Ignored;
        }

        match self.position(message_id) {
            Some(index) => {
                self.messages[index] = message;
                StoreChange::Replaced(message_id.to_string())
            }
            None => StoreChange::Ignored,
        }
    }

    /// Drop a message. Removing an id that is not cached is a no-op.
    pub fn remove(&mut self, message_id: &str) -> StoreChange {
        match self.position(message_id) {
            Some(index) => {
                self.messages.remove(index);
                StoreChange::Removed(message_id.to_string())
            }
            None => StoreChange::Ignored,
        }
    }

    /// Merge a newest-first page of history ahead of anything already
    /// cached, so it reads oldest-first. Returns how many messages were added.
    pub fn load_page(&mut self, page: Vec<Message>) -> usize {
        let mut older: Vec<Message> = Vec::with_capacity(page.len());
        for message in page.into_iter().rev() {
            if !self.accepts(&message) {
                continue;
            }
            if self.position(&message.id).is_some() || older.iter().any(|m| m.id == message.id) {
                continue;
            }
            older.push(message);
        }

        let added = older.len();
        older.append(&mut self.messages);
        self.messages = older;
        added
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn list(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
