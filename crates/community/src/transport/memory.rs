//! In-process loopback broker.
//!
//! [`MemoryBroker`] plays the server side of the realtime protocol: it
//! tracks which rooms each connection has joined, relays typing events to the
//! other members of a room, and lets the embedding code publish events into
//! rooms. It is also the connector used by the test suites.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Connector, Transport};
use crate::entities::Identity;
use crate::types::{
    ChannelId, CommunityError, CommunityResult, InboundEvent, OutboundEvent, UserStopTyping,
    UserTyping,
};

#[derive(Debug)]
struct Connection {
    user_id: String,
    username: String,
    rooms: HashSet<ChannelId>,
    sender: mpsc::UnboundedSender<InboundEvent>,
}

#[derive(Debug, Default)]
struct BrokerState {
    connections: HashMap<u64, Connection>,
    next_id: u64,
    outbound: Vec<OutboundEvent>,
    failing_connects: u32,
}

impl BrokerState {
    fn relay(&self, from: u64, channel_id: &str, event: InboundEvent) {
        for (id, connection) in &self.connections {
            if *id != from && connection.rooms.contains(channel_id) {
                let _ = connection.sender.send(event.clone());
            }
        }
    }

    fn apply(&mut self, from: u64, event: OutboundEvent) {
        self.outbound.push(event.clone());

        let Some(connection) = self.connections.get_mut(&from) else {
            return;
        };
        let user_id = connection.user_id.clone();
        let username = connection.username.clone();

        match event {
            OutboundEvent::JoinChannel(channel_id) => {
                connection.rooms.insert(channel_id);
            }
            OutboundEvent::LeaveChannel(channel_id) => {
                connection.rooms.remove(&channel_id);
            }
            OutboundEvent::TypingStart(payload) => {
                let relayed = InboundEvent::UserTyping(UserTyping {
                    user_id,
                    channel_id: Some(payload.channel_id.clone()),
                    username: Some(username),
                });
                self.relay(from, &payload.channel_id, relayed);
            }
            OutboundEvent::TypingStop(payload) => {
                let relayed = InboundEvent::UserStopTyping(UserStopTyping {
                    channel_id: Some(payload.channel_id.clone()),
                    user_id: Some(user_id),
                });
                self.relay(from, &payload.channel_id, relayed);
            }
        }
    }
}

/// Shared handle to the loopback broker. Clones share one broker.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event to every connection subscribed to `channel_id`.
    /// Returns the number of connections reached.
    pub fn publish(&self, channel_id: &str, event: InboundEvent) -> usize {
        let state = self.lock();
        state
            .connections
            .values()
            .filter(|connection| connection.rooms.contains(channel_id))
            .filter(|connection| connection.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Deliver an event to every open connection regardless of rooms.
    pub fn push(&self, event: InboundEvent) -> usize {
        let state = self.lock();
        state
            .connections
            .values()
            .filter(|connection| connection.sender.send(event.clone()).is_ok())
            .count()
    }

    /// Every outbound event received so far, in order.
    pub fn outbound(&self) -> Vec<OutboundEvent> {
        self.lock().outbound.clone()
    }

    /// Union of rooms joined by the open connections.
    pub fn subscribed_rooms(&self) -> BTreeSet<ChannelId> {
        self.lock()
            .connections
            .values()
            .flat_map(|connection| connection.rooms.iter().cloned())
            .collect()
    }

    pub fn open_connections(&self) -> usize {
        self.lock().connections.len()
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: u32) {
        self.lock().failing_connects = count;
    }

    /// Drop every connection from the broker side.
    pub fn disconnect_all(&self) {
        self.lock().connections.clear();
    }
}

#[async_trait]
impl Connector for MemoryBroker {
    async fn connect(&self, identity: &Identity) -> CommunityResult<Box<dyn Transport>> {
        let mut state = self.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(CommunityError::transport("connection refused"));
        }

        let id = state.next_id;
        state.next_id += 1;

        let (sender, events) = mpsc::unbounded_channel();
        state.connections.insert(
            id,
            Connection {
                user_id: identity.connection_user().to_string(),
                username: identity.display_name.clone(),
                rooms: HashSet::new(),
                sender,
            },
        );
        debug!(connection = id, "loopback connection opened");

        Ok(Box::new(MemoryTransport {
            id,
            broker: self.clone(),
            events,
            closed: false,
        }))
    }
}

/// Client end of a loopback connection.
#[derive(Debug)]
pub struct MemoryTransport {
    id: u64,
    broker: MemoryBroker,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    closed: bool,
}

impl MemoryTransport {
    fn detach(&mut self) {
        if !self.closed {
            self.closed = true;
            self.broker.lock().connections.remove(&self.id);
            self.events.close();
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn emit(&mut self, event: OutboundEvent) -> CommunityResult<()> {
        if self.closed {
            return Err(CommunityError::NotConnected);
        }

        let mut state = self.broker.lock();
        if !state.connections.contains_key(&self.id) {
            return Err(CommunityError::NotConnected);
        }
        state.apply(self.id, event);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) -> CommunityResult<()> {
        self.detach();
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.detach();
    }
}
