//! Dismissible user-visible errors.

use crate::types::CommunityError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
    /// Whether repeating the action by hand may succeed.
    pub retryable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Notices {
    items: Vec<Notice>,
    next_id: u64,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, retryable: bool) -> u64 {
        self.next_id += 1;
        self.items.push(Notice {
            id: self.next_id,
            message: message.into(),
            retryable,
        });
        self.next_id
    }

    pub fn push_error(&mut self, error: &CommunityError) -> u64 {
        self.push(error.to_string(), error.is_retryable())
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|notice| notice.id != id);
        self.items.len() != before
    }

    /// Remove and return every notice.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }

    pub fn list(&self) -> &[Notice] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut notices = Notices::new();
        let first = notices.push_error(&CommunityError::transport("reset"));
        let second = notices.push("Message cannot be empty", false);

        assert!(notices.list()[0].retryable);
        assert!(notices.dismiss(first));
        assert!(!notices.dismiss(first));
        assert_eq!(notices.list()[0].id, second);

        assert_eq!(notices.drain().len(), 1);
        assert!(notices.is_empty());
    }
}
