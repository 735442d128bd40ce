//! # Wellspring Community Crate
//!
//! Client-side synchronization for the peer-support community chat: channel
//! directory, realtime room subscription, message cache, typing presence, and
//! the confirmation-gated send path with its join-and-retry fallback.
//!
//! ## Architecture
//!
//! - **Entities**: Community, Channel, Message, Identity
//! - **Types**: errors, wire events, request/response payloads
//! - **Api**: REST client for the community backend
//! - **Transport**: realtime connection seam (websocket and in-memory)
//! - **Session**: one owned connection per mounted chat view
//! - **Store / Typing / Send / Directory**: per-view state machines
//! - **Chat**: the view-model composing all of the above
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wellspring_community::{CommunityChat, ChatOptions, HttpCommunityApi, Identity};
//!
//! let mut chat = CommunityChat::new(api, connector, Identity::anonymous(), escalation, options);
//! chat.mount().await?;
//! chat.select_community("study-stress").await;
//! ```

pub mod api;
pub mod chat;
pub mod directory;
pub mod entities;
pub mod notice;
pub mod send;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod typing;
pub mod utils;

// Re-export main types for convenience
pub use api::{CommunityApi, HttpCommunityApi};
pub use chat::{ChatOptions, CommunityChat, SubmitReport};
pub use directory::ChannelDirectory;
pub use entities::{Author, Channel, Community, Identity, Membership, Message, Page};
pub use notice::{Notice, Notices};
pub use send::{HandlePrompt, RejectReason, SendCoordinator, SendOutcome, SendRequest, SendState};
pub use session::{ConnectionSession, ConnectionState, ReconnectPolicy, SwitchToken};
pub use store::{MessageStore, StoreChange};
pub use transport::{
    Connector, MemoryBroker, MemoryTransport, Transport, WebSocketConnector, WebSocketTransport,
};
pub use types::{
    ChannelId, CommunityError, CommunityId, CommunityResult, DecodeError, InboundEvent, MessageId,
    OutboundEvent, UserId,
};
pub use typing::{TypingSignal, TypingState, TypingTracker};
