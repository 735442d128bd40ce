//! Community and channel selection.

use tracing::debug;

use crate::api::CommunityApi;
use crate::entities::{Channel, Community};
use crate::types::{CommunityError, CommunityResult};

/// Directory state for one chat view: the community list, the selected
/// community with its channels, and the selected channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    communities: Vec<Community>,
    has_more: bool,
    community: Option<Community>,
    channels: Vec<Channel>,
    channel: Option<Channel>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the first page of communities.
    pub async fn load_communities(&mut self, api: &dyn CommunityApi) -> CommunityResult<&[Community]> {
        let page = api.list_communities(1).await?;
        debug!(count = page.items.len(), has_more = page.has_more, "communities loaded");

        self.communities = page.items;
        self.has_more = page.has_more;
        Ok(&self.communities)
    }

    /// Select a community, fetch its channels, and default the channel
    /// selection to the first one. Returns the defaulted channel.
    pub async fn select_community(
        &mut self,
        api: &dyn CommunityApi,
        community_id: &str,
    ) -> CommunityResult<Option<&Channel>> {
        let community = match self.communities.iter().find(|c| c.id == community_id) {
            Some(community) => community.clone(),
            None => api.get_community(community_id).await?,
        };
        let channels = api.list_channels(&community.id).await?;
        debug!(community_id, channels = channels.len(), "community selected");

        self.channel = channels.first().cloned();
        self.channels = channels;
        self.community = Some(community);
        Ok(self.channel.as_ref())
    }

    /// Select one of the current community's channels.
    pub fn select_channel(&mut self, channel_id: &str) -> CommunityResult<&Channel> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| CommunityError::not_found(format!("channel {channel_id}")))?;

        Ok(&*self.channel.insert(channel))
    }

    /// Forget the selected community, e.g. after leaving it.
    pub fn clear_community(&mut self) {
        self.community = None;
        self.channels.clear();
        self.channel = None;
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn has_more_communities(&self) -> bool {
        self.has_more
    }

    pub fn community(&self) -> Option<&Community> {
        self.community.as_ref()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Resolve a channel by id or, failing that, by case-insensitive name.
    pub fn find_channel(&self, id_or_name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id == id_or_name)
            .or_else(|| {
                self.channels
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(id_or_name))
            })
    }
}
