use serde::{Deserialize, Serialize};

use crate::types::UserId;

const ANONYMOUS_NAME: &str = "Anonymous";

/// Who the realtime connection is opened for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub display_name: String,
}

impl Identity {
    pub fn user(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            display_name: display_name.into(),
        }
    }

    /// Placeholder used when the portal is not authenticated.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            display_name: ANONYMOUS_NAME.to_string(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Value sent as the connection's user parameter.
    pub fn connection_user(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }

    /// True when `user_id` refers to this identity.
    pub fn is_self(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}
