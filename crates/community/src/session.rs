//! Realtime session owned by one mounted chat view.
//!
//! The session holds the transport and the single subscribed room. Switching
//! rooms leaves the previous one before joining the next, and every switch
//! bumps a counter so results fetched for a superseded room can be told apart
//! from the latest ones.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use wellspring_config::ReconnectConfig;

use crate::entities::Identity;
use crate::transport::{Connector, Transport};
use crate::types::{ChannelId, CommunityError, CommunityResult, InboundEvent, OutboundEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Issued by [`ConnectionSession::switch_channel`]; only the latest token is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwitchToken(u64);

impl SwitchToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Bounded exponential backoff for connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// A single attempt with no waiting.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), before jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Backoff plus up to a quarter of random jitter, still capped.
    fn jittered(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let spread = base.as_millis() as u64 / 4;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        (base + Duration::from_millis(jitter)).min(self.max_backoff)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

pub struct ConnectionSession {
    connector: Arc<dyn Connector>,
    identity: Identity,
    policy: ReconnectPolicy,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    active_channel: Option<ChannelId>,
    switches: u64,
    closed: bool,
}

impl ConnectionSession {
    pub fn new(connector: Arc<dyn Connector>, identity: Identity, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            identity,
            policy,
            transport: None,
            state: ConnectionState::Disconnected,
            active_channel: None,
            switches: 0,
            closed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn active_channel(&self) -> Option<&str> {
        self.active_channel.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open the transport, retrying per the reconnect policy. Re-joins the
    /// active room if one was selected before the connection came up.
    pub async fn connect(&mut self) -> CommunityResult<()> {
        if self.closed {
            return Err(CommunityError::NotConnected);
        }
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        let attempts = self.policy.attempts();
        let mut last_error = CommunityError::NotConnected;

        for attempt in 1..=attempts {
            match self.connector.connect(&self.identity).await {
                Ok(transport) => {
                    self.transport = Some(transport);
                    self.state = ConnectionState::Connected;
                    info!(attempt, "realtime session connected");

                    if let Some(channel_id) = self.active_channel.clone() {
                        self.send(OutboundEvent::JoinChannel(channel_id)).await?;
                    }
                    return Ok(());
                }
                Err(error) => {
                    warn!(attempt, attempts, %error, "realtime connect failed");
                    last_error = error;
                    if attempt < attempts {
                        let delay = self.policy.jittered(attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.state = ConnectionState::Disconnected;
        Err(last_error)
    }

    /// Drop the current transport and connect again.
    pub async fn reconnect(&mut self) -> CommunityResult<()> {
        if let Some(mut transport) = self.transport.take() {
            if let Err(error) = transport.close().await {
                debug!(%error, "closing stale transport failed");
            }
        }
        self.state = ConnectionState::Disconnected;
        info!(channel_id = ?self.active_channel, "reconnecting realtime session");
        self.connect().await
    }

    /// Make `next` the only subscribed room.
    ///
    /// Always issues a fresh token. Switching to the room already active emits
    /// nothing. While disconnected the room is only recorded; it is joined on
    /// the next successful connect.
    pub async fn switch_channel(&mut self, next: impl Into<ChannelId>) -> CommunityResult<SwitchToken> {
        let next = next.into();
        self.switches += 1;
        let token = SwitchToken(self.switches);

        if self.active_channel.as_deref() == Some(next.as_str()) {
            return Ok(token);
        }

        let previous = self.active_channel.replace(next.clone());
        debug!(from = ?previous, to = %next, token = token.0, "switching channel");

        if self.transport.is_none() {
            return Ok(token);
        }
        if let Some(previous) = previous {
            self.send(OutboundEvent::LeaveChannel(previous)).await?;
        }
        self.send(OutboundEvent::JoinChannel(next)).await?;

        Ok(token)
    }

    /// Leave the active room without joining another.
    pub async fn clear_channel(&mut self) -> CommunityResult<()> {
        self.switches += 1;
        match self.active_channel.take() {
            Some(previous) if self.transport.is_some() => {
                self.send(OutboundEvent::LeaveChannel(previous)).await
            }
            _ => Ok(()),
        }
    }

    /// Whether `token` came from the most recent switch.
    pub fn is_current(&self, token: SwitchToken) -> bool {
        token.0 == self.switches
    }

    /// Send an event on the open transport. After teardown the event is
    /// dropped.
    pub async fn emit(&mut self, event: OutboundEvent) -> CommunityResult<()> {
        if self.closed {
            debug!(event_type = event.event_type_name(), "dropping event after teardown");
            return Ok(());
        }
        self.send(event).await
    }

    async fn send(&mut self, event: OutboundEvent) -> CommunityResult<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(CommunityError::NotConnected);
        };

        if let Err(error) = transport.emit(event).await {
            warn!(%error, "realtime emit failed, marking session disconnected");
            self.transport = None;
            self.state = ConnectionState::Disconnected;
            return Err(error);
        }
        Ok(())
    }

    /// Whether an inbound event belongs to the active room. Events that do not
    /// name a channel are attributed to the active room.
    pub fn accepts(&self, event: &InboundEvent) -> bool {
        match (event.channel_id(), self.active_channel.as_deref()) {
            (Some(channel_id), Some(active)) => channel_id == active,
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }

    /// Next event for the active room. Events for other rooms are dropped.
    /// Returns `None` once the connection is gone; the session is then
    /// `Disconnected` and may be reconnected.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        loop {
            let transport = self.transport.as_mut()?;

            match transport.next_event().await {
                Some(event) if self.accepts(&event) => return Some(event),
                Some(event) => {
                    debug!(
                        event_type = event.event_type_name(),
                        channel_id = ?event.channel_id(),
                        "dropping event for inactive channel"
                    );
                }
                None => {
                    if !self.closed {
                        warn!("realtime connection lost");
                    }
                    self.transport = None;
                    self.state = ConnectionState::Disconnected;
                    return None;
                }
            }
        }
    }

    /// Tear the session down: close the transport and forget the room.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.active_channel = None;
        self.state = ConnectionState::Disconnected;

        if let Some(mut transport) = self.transport.take() {
            if let Err(error) = transport.close().await {
                warn!(%error, "closing realtime transport failed");
            }
        }
        info!("realtime session closed");
    }
}
