//! WebSocket transport built on `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use wellspring_config::RealtimeConfig;

use super::{Connector, Transport};
use crate::entities::Identity;
use crate::types::{CommunityError, CommunityResult, InboundEvent, OutboundEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 256;

/// Opens websocket connections to the realtime broker.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.url.clone(), config.connect_timeout())
    }

    /// Broker URL with the identity attached as query parameters.
    pub fn endpoint(&self, identity: &Identity) -> CommunityResult<Url> {
        let mut url = Url::parse(&self.url).map_err(|error| {
            CommunityError::validation(format!("invalid realtime url {}: {error}", self.url))
        })?;

        url.query_pairs_mut()
            .append_pair("userId", identity.connection_user())
            .append_pair("username", &identity.display_name);

        Ok(url)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, identity: &Identity) -> CommunityResult<Box<dyn Transport>> {
        let url = self.endpoint(identity)?;

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                CommunityError::transport(format!(
                    "timed out after {:?} connecting to {}",
                    self.connect_timeout, self.url
                ))
            })??;

        info!(url = %self.url, anonymous = identity.is_anonymous(), "realtime connection opened");

        Ok(Box::new(WebSocketTransport::start(stream)))
    }
}

/// Open websocket connection. A reader task decodes inbound frames into a
/// bounded channel; it is aborted when the transport is closed or dropped.
pub struct WebSocketTransport {
    sink: SplitSink<WsStream, WsMessage>,
    events: mpsc::Receiver<InboundEvent>,
    reader: JoinHandle<()>,
    closed: bool,
}

impl WebSocketTransport {
    fn start(stream: WsStream) -> Self {
        let (sink, stream) = stream.split();
        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        let reader = tokio::spawn(read_frames(stream, tx));

        Self {
            sink,
            events,
            reader,
            closed: false,
        }
    }
}

async fn read_frames(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<InboundEvent>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match InboundEvent::decode(&text) {
                Ok(event) => {
                    debug!(event_type = event.event_type_name(), "realtime event received");
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(error) => warn!(%error, "ignoring realtime frame"),
            },
            Ok(WsMessage::Close(frame)) => {
                debug!(?frame, "realtime connection closed by broker");
                break;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(%error, "realtime receive failed");
                break;
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn emit(&mut self, event: OutboundEvent) -> CommunityResult<()> {
        if self.closed {
            return Err(CommunityError::NotConnected);
        }

        let frame = event.to_frame()?;
        debug!(
            event_type = event.event_type_name(),
            channel_id = event.channel_id(),
            "emitting realtime event"
        );
        self.sink.send(WsMessage::Text(frame)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) -> CommunityResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader.abort();
        self.events.close();
        self.sink.close().await?;
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
