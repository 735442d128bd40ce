//! Conversation history kept for the companion surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wellspring_safety::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Companion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
    /// Crisis severity detected in this turn, if any.
    pub flagged: Option<Severity>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>, flagged: Option<Severity>) -> &Turn {
        self.turns.push(Turn {
            role,
            content: content.into(),
            at: Utc::now(),
            flagged,
        });
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `limit` turns, oldest first. A limit of zero means all.
    pub fn recent(&self, limit: usize) -> &[Turn] {
        if limit == 0 || limit >= self.turns.len() {
            return &self.turns;
        }
        &self.turns[self.turns.len() - limit..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
