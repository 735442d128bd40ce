//! Shared types for community chat.
//!
//! Error definitions, realtime wire events, and REST payloads used across
//! the crate.

pub mod errors;
pub mod events;
pub mod requests;
pub mod responses;

// Re-export common types
pub use errors::{CommunityError, CommunityResult};
pub use events::*;
pub use requests::*;
pub use responses::*;

// Common type aliases
pub type CommunityId = String;
pub type ChannelId = String;
pub type MessageId = String;
pub type UserId = String;
