//! Request bodies sent to the community backend.

use serde::{Deserialize, Serialize};

/// Body for posting, replying to, or editing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub body: String,
}

impl MessageBody {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Body for joining a community under a display handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCommunityBody {
    pub handle: String,
}

/// Query for a message page. The backend returns newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePageQuery {
    pub page: u32,
    pub limit: u32,
}

impl MessagePageQuery {
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }

    pub(crate) fn as_params(&self) -> [(&'static str, String); 3] {
        [
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("order", "desc".to_string()),
        ]
    }
}
