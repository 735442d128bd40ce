//! Community chat view-model.
//!
//! [`CommunityChat`] owns everything one mounted chat view needs: the channel
//! directory, its realtime session, the message cache, typing presence, and
//! the send path. User-authored text goes through the crisis detector before
//! it is sent; a positive signal escalates but never blocks the send.
//!
//! Failures never tear the view down. They are kept as dismissible
//! [`Notice`]s and also returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use wellspring_config::AppConfig;
use wellspring_safety::{assess, Escalation, EscalationDispatcher, Surface};

use crate::api::CommunityApi;
use crate::directory::ChannelDirectory;
use crate::entities::{Community, Identity, Message, Page};
use crate::notice::{Notice, Notices};
use crate::send::{HandlePrompt, SendCoordinator, SendOutcome, SendRequest, SendState};
use crate::session::{ConnectionSession, ConnectionState, ReconnectPolicy, SwitchToken};
use crate::store::MessageStore;
use crate::transport::Connector;
use crate::types::{
    ChannelId, CommunityError, CommunityResult, InboundEvent, MessagePageQuery, OutboundEvent,
};
use crate::typing::{TypingSignal, TypingTracker};
use crate::utils::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    /// Size of the first message page fetched on channel entry.
    pub page_size: u32,
    pub local_typing_idle: Duration,
    pub remote_typing_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ChatOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_size: config.messages.page_size,
            local_typing_idle: Duration::from_millis(config.typing.local_idle_ms),
            remote_typing_timeout: Duration::from_millis(config.typing.remote_timeout_ms),
            reconnect: ReconnectPolicy::from(&config.realtime.reconnect),
        }
    }
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of submitting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    /// Present when the text carried a crisis signal.
    pub escalation: Option<Escalation>,
    /// Present when the backend confirmed the message.
    pub outcome: Option<SendOutcome>,
    /// Present when the send did not go through.
    pub notice: Option<Notice>,
}

impl SubmitReport {
    pub fn is_sent(&self) -> bool {
        self.outcome.is_some()
    }
}

pub struct CommunityChat {
    api: Arc<dyn CommunityApi>,
    prompt: Arc<dyn HandlePrompt>,
    escalation: EscalationDispatcher,
    options: ChatOptions,
    directory: ChannelDirectory,
    session: ConnectionSession,
    store: MessageStore,
    typing: TypingTracker,
    sender: SendCoordinator,
    notices: Notices,
}

impl CommunityChat {
    pub fn new(
        api: Arc<dyn CommunityApi>,
        connector: Arc<dyn Connector>,
        prompt: Arc<dyn HandlePrompt>,
        identity: Identity,
        escalation: EscalationDispatcher,
        options: ChatOptions,
    ) -> Self {
        let typing = TypingTracker::new(options.local_typing_idle, options.remote_typing_timeout)
            .with_self_user(Some(identity.connection_user().to_string()));
        let session = ConnectionSession::new(connector, identity, options.reconnect);

        Self {
            api,
            prompt,
            escalation,
            options,
            directory: ChannelDirectory::new(),
            session,
            store: MessageStore::new(),
            typing,
            sender: SendCoordinator::new(),
            notices: Notices::new(),
        }
    }

    fn record<T>(&mut self, result: CommunityResult<T>) -> CommunityResult<T> {
        if let Err(error) = &result {
            self.notices.push_error(error);
        }
        result
    }

    /// Open the realtime session and load the community list.
    pub async fn mount(&mut self) -> CommunityResult<()> {
        let connected = self.session.connect().await;
        self.record(connected)?;

        let loaded = self.directory.load_communities(self.api.as_ref()).await.map(|_| ());
        self.record(loaded)
    }

    pub async fn reload_communities(&mut self) -> CommunityResult<()> {
        let loaded = self.directory.load_communities(self.api.as_ref()).await.map(|_| ());
        self.record(loaded)
    }

    /// Open a community and enter its first channel.
    pub async fn select_community(&mut self, community_id: &str) -> CommunityResult<()> {
        let selected = self
            .directory
            .select_community(self.api.as_ref(), community_id)
            .await
            .map(|channel| channel.map(|c| c.id.clone()));
        let default_channel = self.record(selected)?;

        match default_channel {
            Some(channel_id) => self.enter_channel(&channel_id).await,
            None => {
                debug!(community_id, "community has no channels");
                let cleared = self.exit_channel().await;
                self.record(cleared)
            }
        }
    }

    /// Enter one of the current community's channels, by id or name.
    pub async fn select_channel(&mut self, id_or_name: &str) -> CommunityResult<()> {
        let channel_id = self.directory.find_channel(id_or_name).map(|c| c.id.clone());
        let channel_id = self.record(
            channel_id.ok_or_else(|| CommunityError::not_found(format!("channel {id_or_name}"))),
        )?;

        let selected = self.directory.select_channel(&channel_id).map(|_| ());
        self.record(selected)?;
        self.enter_channel(&channel_id).await
    }

    async fn enter_channel(&mut self, channel_id: &str) -> CommunityResult<()> {
        let switched = self.begin_channel_switch(channel_id).await;
        let token = self.record(switched)?;

        let query = MessagePageQuery::first(self.options.page_size);
        let page = self.api.list_messages(channel_id, query).await;
        let page = self.record(page)?;

        self.apply_page(token, page);
        Ok(())
    }

    /// Switch the subscription and local state to `channel_id`. The returned
    /// token gates [`apply_page`](Self::apply_page) for this switch.
    pub async fn begin_channel_switch(&mut self, channel_id: &str) -> CommunityResult<SwitchToken> {
        if self.typing.reset() == Some(TypingSignal::Stop) {
            if let Some(previous) = self.session.active_channel().map(ChannelId::from) {
                let _ = self.session.emit(OutboundEvent::typing_stop(previous)).await;
            }
        }

        self.store.reset(Some(channel_id.to_string()));
        self.sender.reset();
        self.session.switch_channel(channel_id).await
    }

    /// Apply a fetched first page if `token` is still current. Returns
    /// whether it was applied.
    pub fn apply_page(&mut self, token: SwitchToken, page: Page<Message>) -> bool {
        if !self.session.is_current(token) {
            debug!(token = token.value(), "discarding page for superseded channel switch");
            return false;
        }

        let added = self.store.load_page(page.items);
        debug!(added, has_more = page.has_more, "message page applied");
        true
    }

    /// Local keystroke in the composer.
    pub async fn keystroke(&mut self, now: Instant) -> CommunityResult<()> {
        let Some(channel_id) = self.session.active_channel().map(ChannelId::from) else {
            return Ok(());
        };

        self.typing.keystroke(now);
        let username = self.session.identity().display_name.clone();
        let emitted = self
            .session
            .emit(OutboundEvent::typing_start(channel_id, username))
            .await;
        self.record(emitted)
    }

    /// Fire due typing timers.
    pub async fn tick(&mut self, now: Instant) -> CommunityResult<()> {
        if self.typing.poll(now) != Some(TypingSignal::Stop) {
            return Ok(());
        }
        self.emit_typing_stop().await
    }

    async fn emit_typing_stop(&mut self) -> CommunityResult<()> {
        let Some(channel_id) = self.session.active_channel().map(ChannelId::from) else {
            return Ok(());
        };
        let emitted = self.session.emit(OutboundEvent::typing_stop(channel_id)).await;
        self.record(emitted)
    }

    /// When [`tick`](Self::tick) should next be called.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.typing.next_deadline()
    }

    /// Scan, then send a new message to the active channel.
    pub async fn submit(&mut self, text: &str) -> SubmitReport {
        self.submit_request(SendRequest::new(text)).await
    }

    /// Scan, then send a threaded reply to `message_id`.
    pub async fn reply_to(&mut self, message_id: &str, text: &str) -> SubmitReport {
        self.submit_request(SendRequest::reply(message_id, text)).await
    }

    async fn submit_request(&mut self, request: SendRequest) -> SubmitReport {
        let signal = assess(&request.body);
        let escalation = self.escalation.dispatch(Surface::Community, &signal);

        if self.typing.stop_local().is_some() {
            let _ = self.emit_typing_stop().await;
        }

        let target = match (self.directory.community().cloned(), self.session.active_channel()) {
            (Some(community), Some(channel_id)) => Ok((community, channel_id.to_string())),
            _ => Err(CommunityError::NoActiveChannel),
        };

        let result = match target {
            Ok((community, channel_id)) => {
                self.send(&community, &channel_id, request).await
            }
            Err(error) => Err(error),
        };

        match result {
            Ok(outcome) => SubmitReport {
                escalation,
                outcome: Some(outcome),
                notice: None,
            },
            Err(error) => {
                let id = self.notices.push_error(&error);
                let notice = self.notices.list().iter().find(|n| n.id == id).cloned();
                SubmitReport {
                    escalation,
                    outcome: None,
                    notice,
                }
            }
        }
    }

    async fn send(
        &mut self,
        community: &Community,
        channel_id: &str,
        request: SendRequest,
    ) -> CommunityResult<SendOutcome> {
        self.sender
            .submit(
                self.api.as_ref(),
                self.prompt.as_ref(),
                community,
                channel_id,
                request,
                &mut self.store,
            )
            .await
    }

    /// Apply an inbound realtime event. Returns whether visible state changed.
    pub fn handle_event(&mut self, event: InboundEvent, now: Instant) -> bool {
        if !self.session.accepts(&event) {
            return false;
        }

        match event {
            InboundEvent::NewMessage(message) => self.store.append(message).is_change(),
            InboundEvent::MessageUpdated(message) => {
                let id = message.id.clone();
                self.store.replace(&id, message).is_change()
            }
            InboundEvent::MessageDeleted(deleted) => self.store.remove(&deleted.id).is_change(),
            InboundEvent::UserTyping(typing) => {
                let was_typing = self.typing.is_remote_typing();
                self.typing.remote_start(&typing.user_id, now) && !was_typing
            }
            InboundEvent::UserStopTyping(_) => {
                let was_typing = self.typing.is_remote_typing();
                self.typing.remote_stop(now);
                was_typing
            }
        }
    }

    /// Next realtime event for the active channel; `None` once the connection
    /// is lost or closed.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        self.session.next_event().await
    }

    pub async fn reconnect(&mut self) -> CommunityResult<()> {
        let reconnected = self.session.reconnect().await;
        self.record(reconnected)
    }

    /// Edit one of the user's messages. The new text is scanned like any
    /// other user-authored text.
    pub async fn edit_message(
        &mut self,
        message_id: &str,
        text: &str,
    ) -> CommunityResult<Option<Escalation>> {
        let escalation = self
            .escalation
            .dispatch(Surface::Community, &assess(text));

        let body = Validator::message_body(text);
        let body = self.record(body)?;
        let edited = self.api.edit_message(message_id, &body).await;
        let edited = self.record(edited)?;

        self.store.replace(message_id, edited);
        Ok(escalation)
    }

    pub async fn delete_message(&mut self, message_id: &str) -> CommunityResult<()> {
        let deleted = self.api.delete_message(message_id).await;
        self.record(deleted)?;
        self.store.remove(message_id);
        Ok(())
    }

    /// Leave the selected community and its room.
    pub async fn leave_community(&mut self) -> CommunityResult<()> {
        let community_id = self.directory.community().map(|c| c.id.clone());
        let community_id = self.record(community_id.ok_or(CommunityError::NoActiveChannel))?;

        let left = self.api.leave_community(&community_id).await;
        self.record(left)?;

        let cleared = self.exit_channel().await;
        self.directory.clear_community();
        info!(community_id = %community_id, "left community");
        self.record(cleared)
    }

    /// Leave the active room and drop everything tied to it.
    async fn exit_channel(&mut self) -> CommunityResult<()> {
        if self.typing.reset() == Some(TypingSignal::Stop) {
            let _ = self.emit_typing_stop().await;
        }
        let cleared = self.session.clear_channel().await;
        self.store.reset(None);
        self.sender.reset();
        cleared
    }

    /// Tear down the realtime session. Nothing is delivered afterwards.
    pub async fn unmount(&mut self) {
        if self.typing.reset() == Some(TypingSignal::Stop) {
            let _ = self.emit_typing_stop().await;
        }
        self.session.close().await;
        self.store.reset(None);
        self.sender.reset();
    }

    pub fn messages(&self) -> &[Message] {
        self.store.list()
    }

    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    pub fn active_channel(&self) -> Option<&str> {
        self.session.active_channel()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn is_remote_typing(&self) -> bool {
        self.typing.is_remote_typing()
    }

    pub fn send_state(&self) -> SendState {
        self.sender.state()
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.list()
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn escalation(&self) -> &EscalationDispatcher {
        &self.escalation
    }
}
