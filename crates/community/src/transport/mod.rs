//! Realtime connection seam.
//!
//! A [`Connector`] opens one [`Transport`] per mounted chat view. The
//! transport carries JSON frames in both directions; inbound frames that do
//! not decode into an [`InboundEvent`] are logged and skipped by the
//! implementation, so callers only ever see well-formed events.

pub mod memory;
pub mod websocket;

pub use memory::{MemoryBroker, MemoryTransport};
pub use websocket::{WebSocketConnector, WebSocketTransport};

use async_trait::async_trait;

use crate::entities::Identity;
use crate::types::{CommunityResult, InboundEvent, OutboundEvent};

/// One open realtime connection.
#[async_trait]
pub trait Transport: Send {
    /// Send a single event to the broker.
    async fn emit(&mut self, event: OutboundEvent) -> CommunityResult<()>;

    /// Next decoded event, or `None` once the connection is gone.
    async fn next_event(&mut self) -> Option<InboundEvent>;

    /// Close the connection. Closing twice is harmless.
    async fn close(&mut self) -> CommunityResult<()>;
}

/// Opens transports on behalf of an identity (or the anonymous placeholder).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, identity: &Identity) -> CommunityResult<Box<dyn Transport>>;
}
