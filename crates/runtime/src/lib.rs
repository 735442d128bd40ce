use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use wellspring_community::{
    ChatOptions, CommunityApi, CommunityChat, Connector, HandlePrompt, HttpCommunityApi, Identity,
    WebSocketConnector,
};
use wellspring_companion::{CompanionChat, HttpReplyProvider};
use wellspring_config::AppConfig;
use wellspring_safety::EscalationDispatcher;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Install the global subscriber. Logs go to stderr so they do not mix
    /// with the chat transcript on stdout.
    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything a chat surface needs, built once from configuration.
///
/// Both surfaces created from the same services share one escalation handle,
/// so crisis mode raised in one is visible in the other.
#[derive(Clone)]
pub struct ClientServices {
    pub config: AppConfig,
    pub api: Arc<dyn CommunityApi>,
    pub connector: Arc<dyn Connector>,
    pub companion: HttpReplyProvider,
    pub escalation: EscalationDispatcher,
}

impl ClientServices {
    pub fn initialise(config: &AppConfig) -> Result<Self> {
        let api = HttpCommunityApi::new(&config.api)
            .context("failed to build community api client")?;
        let connector = WebSocketConnector::from_config(&config.realtime);
        let companion = HttpReplyProvider::new(&config.companion)
            .context("failed to build companion client")?;

        info!(
            api = %config.api.base_url,
            realtime = %config.realtime.url,
            companion = %config.companion.base_url,
            "client services ready"
        );

        Ok(Self {
            config: config.clone(),
            api: Arc::new(api),
            connector: Arc::new(connector),
            companion,
            escalation: EscalationDispatcher::new(),
        })
    }

    /// Swap the realtime connector, e.g. for the in-process broker.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions::from_config(&self.config)
    }

    pub fn community_chat(&self, identity: Identity, prompt: Arc<dyn HandlePrompt>) -> CommunityChat {
        CommunityChat::new(
            self.api.clone(),
            self.connector.clone(),
            prompt,
            identity,
            self.escalation.clone(),
            self.chat_options(),
        )
    }

    pub fn companion_chat(&self) -> CompanionChat<HttpReplyProvider> {
        CompanionChat::new(
            self.companion.clone(),
            self.escalation.clone(),
            self.config.companion.history_limit,
        )
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
