use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "wellspring.toml",
    "config/wellspring.toml",
    "crates/config/wellspring.toml",
    "../wellspring.toml",
    "../config/wellspring.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub typing: TypingConfig,
    pub companion: CompanionConfig,
    pub messages: MessagesConfig,
}

/// REST backend used by the channel directory and the send path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub token: Option<String>,
}

impl ApiConfig {
    const fn default_request_timeout() -> u64 {
        15
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            request_timeout_seconds: Self::default_request_timeout(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub url: String,
    #[serde(default = "RealtimeConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl RealtimeConfig {
    const fn default_connect_timeout() -> u64 {
        10
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/realtime".to_string(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Bounded exponential backoff applied to realtime connects.
///
/// ```
/// use wellspring_config::ReconnectConfig;
///
/// let policy = ReconnectConfig::default();
/// assert_eq!(policy.max_attempts, 5);
/// assert_eq!(policy.initial_backoff_ms, 500);
/// assert_eq!(policy.max_backoff_ms, 8_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "ReconnectConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "ReconnectConfig::default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "ReconnectConfig::default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl ReconnectConfig {
    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_initial_backoff() -> u64 {
        500
    }

    const fn default_max_backoff() -> u64 {
        8_000
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff(),
            max_backoff_ms: Self::default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    pub local_idle_ms: u64,
    pub remote_timeout_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            local_idle_ms: 1_000,
            remote_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanionConfig {
    pub base_url: String,
    #[serde(default = "CompanionConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "CompanionConfig::default_history_limit")]
    pub history_limit: usize,
}

impl CompanionConfig {
    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_history_limit() -> usize {
        20
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api/companion".to_string(),
            request_timeout_seconds: Self::default_request_timeout(),
            history_limit: Self::default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    pub page_size: u32,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self { page_size: 50 }
    }
}

/// Load the client configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use wellspring_config::load;
///
/// std::env::remove_var("WELLSPRING_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.api.base_url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("api.base_url", defaults.api.base_url.clone())?
        .set_default(
            "api.request_timeout_seconds",
            to_i64(defaults.api.request_timeout_seconds),
        )?
        .set_default("realtime.url", defaults.realtime.url.clone())?
        .set_default(
            "realtime.connect_timeout_seconds",
            to_i64(defaults.realtime.connect_timeout_seconds),
        )?
        .set_default(
            "realtime.reconnect.max_attempts",
            i64::from(defaults.realtime.reconnect.max_attempts),
        )?
        .set_default(
            "realtime.reconnect.initial_backoff_ms",
            to_i64(defaults.realtime.reconnect.initial_backoff_ms),
        )?
        .set_default(
            "realtime.reconnect.max_backoff_ms",
            to_i64(defaults.realtime.reconnect.max_backoff_ms),
        )?
        .set_default("typing.local_idle_ms", to_i64(defaults.typing.local_idle_ms))?
        .set_default(
            "typing.remote_timeout_ms",
            to_i64(defaults.typing.remote_timeout_ms),
        )?
        .set_default("companion.base_url", defaults.companion.base_url.clone())?
        .set_default(
            "companion.request_timeout_seconds",
            to_i64(defaults.companion.request_timeout_seconds),
        )?
        .set_default(
            "companion.history_limit",
            i64::try_from(defaults.companion.history_limit).unwrap_or(i64::MAX),
        )?
        .set_default("messages.page_size", i64::from(defaults.messages.page_size))?;

    let environment_overrides = config::Environment::with_prefix("WELLSPRING").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("WELLSPRING_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via WELLSPRING_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    // A zero page would make every first fetch empty.
    if config.messages.page_size == 0 {
        config.messages.page_size = MessagesConfig::default().page_size;
    }

    if config.realtime.reconnect.max_backoff_ms < config.realtime.reconnect.initial_backoff_ms {
        config.realtime.reconnect.max_backoff_ms = config.realtime.reconnect.initial_backoff_ms;
    }

    debug!(
        api = %config.api.base_url,
        realtime = %config.realtime.url,
        companion = %config.companion.base_url,
        "loaded client configuration"
    );
    Ok(config)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
