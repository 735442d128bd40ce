use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, CommunityId};

/// Topic-scoped room inside a community. Always owned by exactly one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub community_id: CommunityId,
}

impl Channel {
    pub fn new(
        id: impl Into<ChannelId>,
        name: impl Into<String>,
        community_id: impl Into<CommunityId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            community_id: community_id.into(),
        }
    }
}
