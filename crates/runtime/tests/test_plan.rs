use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use wellspring_community::{Community, ConnectionState, HandlePrompt, Identity, MemoryBroker};
use wellspring_config::AppConfig;
use wellspring_runtime::ClientServices;
use wellspring_safety::{assess, Surface};

struct NoHandle;

#[async_trait]
impl HandlePrompt for NoHandle {
    async fn request_handle(&self, _community: &Community) -> Option<String> {
        None
    }
}

fn build_config() -> AppConfig {
    let mut config = AppConfig::default();
    // nothing listens here, so REST calls fail fast
    config.api.base_url = "http://127.0.0.1:9/api".into();
    config.api.request_timeout_seconds = 2;
    config.realtime.reconnect.max_attempts = 1;
    config
}

fn initialise(config: &AppConfig) -> Result<ClientServices> {
    ClientServices::initialise(config).context("failed to initialise client services")
}

#[test]
fn initialise_builds_services_from_defaults() -> Result<()> {
    let services = initialise(&AppConfig::default())?;

    assert!(!services.escalation.is_active());
    assert_eq!(services.chat_options().page_size, 50);
    Ok(())
}

#[test]
fn initialise_rejects_invalid_api_url() {
    let mut config = build_config();
    config.api.base_url = "not a url".into();

    let error = match ClientServices::initialise(&config) {
        Ok(_) => panic!("expected an invalid base url to fail"),
        Err(error) => error,
    };
    let message = format!("{error:?}");
    assert!(
        message.contains("failed to build community api client"),
        "expected api client context, got {message}"
    );
}

#[test]
fn chat_options_follow_configuration() -> Result<()> {
    let mut config = build_config();
    config.messages.page_size = 20;
    config.typing.remote_timeout_ms = 3_000;

    let options = initialise(&config)?.chat_options();

    assert_eq!(options.page_size, 20);
    assert_eq!(options.remote_typing_timeout.as_millis(), 3_000);
    assert_eq!(options.reconnect.max_attempts, 1);
    Ok(())
}

#[test]
fn surfaces_share_one_escalation_handle() -> Result<()> {
    let services = initialise(&build_config())?;
    let chat = services.community_chat(Identity::anonymous(), Arc::new(NoHandle));
    let companion = services.companion_chat();

    companion
        .escalation()
        .dispatch(Surface::Companion, &assess("everything is hopeless"));

    assert!(chat.escalation().is_active());
    assert!(services.escalation.is_active());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn mount_survives_unreachable_backend() -> Result<()> {
    let broker = MemoryBroker::new();
    let services = initialise(&build_config())?.with_connector(Arc::new(broker.clone()));
    let mut chat = services.community_chat(Identity::user("u-1", "Sam"), Arc::new(NoHandle));

    let result = chat.mount().await;

    assert!(result.is_err(), "listing communities should fail");
    assert_eq!(chat.connection_state(), ConnectionState::Connected);
    assert_eq!(chat.notices().len(), 1);
    assert!(chat.notices()[0].retryable);

    chat.unmount().await;
    assert_eq!(broker.open_connections(), 0);
    Ok(())
}
