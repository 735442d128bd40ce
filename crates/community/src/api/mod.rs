//! REST operations consumed from the community backend.

pub mod http;

use async_trait::async_trait;

use crate::entities::{Channel, Community, Membership, Message, Page};
use crate::types::{CommunityResult, MessagePageQuery};

pub use http::HttpCommunityApi;

/// Request/response surface of the community backend.
///
/// Membership rejections on posting come back as
/// [`CommunityError::MembershipRequired`](crate::types::CommunityError::MembershipRequired).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommunityApi: Send + Sync {
    async fn list_communities(&self, page: u32) -> CommunityResult<Page<Community>>;

    async fn get_community(&self, community_id: &str) -> CommunityResult<Community>;

    async fn join_community(&self, community_id: &str, handle: &str) -> CommunityResult<Membership>;

    async fn leave_community(&self, community_id: &str) -> CommunityResult<()>;

    async fn list_channels(&self, community_id: &str) -> CommunityResult<Vec<Channel>>;

    /// Newest-first page of a channel's messages.
    async fn list_messages(
        &self,
        channel_id: &str,
        query: MessagePageQuery,
    ) -> CommunityResult<Page<Message>>;

    async fn send_message(&self, channel_id: &str, body: &str) -> CommunityResult<Message>;

    async fn edit_message(&self, message_id: &str, body: &str) -> CommunityResult<Message>;

    async fn delete_message(&self, message_id: &str) -> CommunityResult<()>;

    async fn reply_to_message(&self, message_id: &str, body: &str) -> CommunityResult<Message>;
}
