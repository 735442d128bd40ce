//! Validation utilities.

use regex::Regex;

use crate::types::{CommunityError, CommunityResult};

/// Maximum length of a message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate and trim a message body before it is sent or used as an edit.
    pub fn message_body(body: &str) -> CommunityResult<String> {
        let trimmed = body.trim();

        if trimmed.is_empty() {
            return Err(CommunityError::validation("Message cannot be empty"));
        }

        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(CommunityError::validation(format!(
                "Message too long (max {MAX_MESSAGE_CHARS} characters)"
            )));
        }

        Ok(trimmed.to_string())
    }

    /// Validate the display handle a user picks when joining a community.
    pub fn display_handle(handle: &str) -> CommunityResult<String> {
        let trimmed = handle.trim();

        if trimmed.chars().count() < 2 {
            return Err(CommunityError::validation(
                "Display name must be at least 2 characters long",
            ));
        }

        if trimmed.chars().count() > 32 {
            return Err(CommunityError::validation(
                "Display name must be at most 32 characters long",
            ));
        }

        let handle_regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.-]*$")
            .map_err(|e| CommunityError::validation(format!("Invalid handle regex: {e}")))?;

        if !handle_regex.is_match(trimmed) {
            return Err(CommunityError::validation(
                "Display name can only contain letters, numbers, spaces, dots, underscores, and hyphens",
            ));
        }

        Ok(trimmed.to_string())
    }
}
