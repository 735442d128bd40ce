//! Domain entities for community chat.
//!
//! These mirror the payloads the community backend returns. They are
//! fetched read-only except for messages, which the client creates through
//! the send path and then mutates from realtime events.

pub mod channel;
pub mod community;
pub mod identity;
pub mod message;

use serde::{Deserialize, Serialize};

// Re-export all entity types
pub use channel::Channel;
pub use community::{Community, Membership};
pub use identity::Identity;
pub use message::{Author, Message, PendingMessage};

/// One page of a paged list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, has_more: bool) -> Self {
        Self {
            items,
            page,
            has_more,
        }
    }
}
