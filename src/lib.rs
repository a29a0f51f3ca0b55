//! Lark → Keycloak directory sync
//!
//! Mirrors the Lark (Feishu) organization into a Keycloak realm:
//! - departments become a group hierarchy addressed by full path
//! - users are keyed by email and belong to exactly one group
//! - change events arrive over an HTTP webhook or a streaming socket adapter
//!   and are applied one at a time by a single dispatcher

pub mod error;
pub mod events;
pub mod keycloak;
pub mod lark;
pub mod sync;
pub mod token;
pub mod transport;

use anyhow::{bail, Result};
use events::{EventDispatcher, EventQueues, EVENT_QUEUE_CAPACITY};
use keycloak::{IdentityStore, KeycloakClient};
use lark::{LarkClient, SourceDirectory};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sync::{DepartmentSync, UserSync};
use tokio::net::TcpListener;
use transport::{BackoffPolicy, RegistrationFrame, StreamClient, WebhookState};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub lark: LarkConfig,
    pub keycloak: KeycloakConfig,
    /// Reconnect policy of the streaming transport
    pub reconnect: BackoffPolicy,
}

/// Server / transport section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// `http` or `websocket`
    pub event_source: String,
    pub websocket_endpoint: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            event_source: "websocket".into(),
            websocket_endpoint: None,
            http_timeout_secs: 30,
        }
    }
}

/// Lark app credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LarkConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Token every inbound webhook payload must carry
    pub verification_token: String,
    pub encrypt_key: String,
}

impl Default for LarkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn/open-apis".into(),
            app_id: String::new(),
            app_secret: String::new(),
            verification_token: String::new(),
            encrypt_key: String::new(),
        }
    }
}

/// Keycloak service account
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeycloakConfig {
    pub host: String,
    /// `/auth` for legacy distributions, empty for Keycloak 17+
    pub base_path: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            base_path: "/auth".into(),
            realm: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Where change events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// Lark pushes to our webhook
    Http,
    /// We hold a socket to the stream adapter
    Websocket,
}

impl EventSource {
    /// `http` selects the webhook; anything else selects the stream.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("http") {
            Self::Http
        } else {
            Self::Websocket
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub lark: LarkConfig,
    pub keycloak: KeycloakConfig,
    pub event_source: EventSource,
    pub server_port: u16,
    pub websocket_endpoint: Option<String>,
    pub http_timeout_secs: u64,
    pub reconnect: BackoffPolicy,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let env = |name: &str| std::env::var(name).ok();

        let lark = LarkConfig {
            base_url: env("LARK_BASE_URL").unwrap_or(yaml.lark.base_url),
            app_id: env("LARK_APP_ID").unwrap_or(yaml.lark.app_id),
            app_secret: env("LARK_APP_SECRET").unwrap_or(yaml.lark.app_secret),
            verification_token: env("LARK_VERIFICATION_TOKEN")
                .unwrap_or(yaml.lark.verification_token),
            encrypt_key: env("LARK_ENCRYPT_KEY").unwrap_or(yaml.lark.encrypt_key),
        };
        let keycloak = KeycloakConfig {
            host: env("KEYCLOAK_HOST").unwrap_or(yaml.keycloak.host),
            base_path: env("KEYCLOAK_BASE_PATH").unwrap_or(yaml.keycloak.base_path),
            realm: env("KEYCLOAK_REALM").unwrap_or(yaml.keycloak.realm),
            client_id: env("KEYCLOAK_CLIENT_ID").unwrap_or(yaml.keycloak.client_id),
            client_secret: env("KEYCLOAK_CLIENT_SECRET").unwrap_or(yaml.keycloak.client_secret),
        };

        Ok(Self {
            lark,
            keycloak,
            event_source: EventSource::parse(
                &env("EVENT_RESOURCE").unwrap_or(yaml.server.event_source),
            ),
            server_port: env("SERVER_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            websocket_endpoint: env("WEBSOCKET_ADAPTER_ENDPOINT")
                .or(yaml.server.websocket_endpoint)
                .filter(|s| !s.is_empty()),
            http_timeout_secs: env("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.http_timeout_secs),
            reconnect: yaml.reconnect,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    /// Fail on the first missing required setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("KEYCLOAK_HOST", &self.keycloak.host),
            ("KEYCLOAK_REALM", &self.keycloak.realm),
            ("KEYCLOAK_CLIENT_ID", &self.keycloak.client_id),
            ("KEYCLOAK_CLIENT_SECRET", &self.keycloak.client_secret),
            ("LARK_APP_ID", &self.lark.app_id),
            ("LARK_APP_SECRET", &self.lark.app_secret),
            ("LARK_VERIFICATION_TOKEN", &self.lark.verification_token),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("missing required setting {name}");
            }
        }
        if self.event_source == EventSource::Websocket && self.websocket_endpoint.is_none() {
            bail!("missing required setting WEBSOCKET_ADAPTER_ENDPOINT for the websocket event source");
        }
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Shared sync state: the two directory clients plus configuration
#[derive(Clone)]
pub struct SyncState {
    pub source: Arc<dyn SourceDirectory>,
    pub target: Arc<dyn IdentityStore>,
    pub config: Arc<Config>,
}

impl SyncState {
    /// Build the REST clients over one shared HTTP client
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let source = Arc::new(LarkClient::new(http.clone(), &config.lark));
        let target = Arc::new(KeycloakClient::new(http, &config.keycloak));
        Ok(Self::with_stores(config, source, target))
    }

    pub fn with_stores(
        config: Config,
        source: Arc<dyn SourceDirectory>,
        target: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            source,
            target,
            config: Arc::new(config),
        }
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(
            Arc::new(UserSync::new(self.source.clone(), self.target.clone())),
            Arc::new(DepartmentSync::new(self.source.clone(), self.target.clone())),
        )
    }
}

/// Start the dispatcher and the configured transport. Runs until the
/// transport stops.
pub async fn run(config: Config) -> Result<()> {
    let state = SyncState::new(config)?;
    let (queues, receivers) = EventQueues::new(EVENT_QUEUE_CAPACITY);
    let dispatcher = state.dispatcher().spawn(receivers);

    let result = match state.config.event_source {
        EventSource::Http => serve_webhook(&state.config, queues).await,
        EventSource::Websocket => run_stream(&state.config, queues).await,
    };

    dispatcher.abort();
    result
}

/// Serve the webhook receiver until Ctrl-C.
pub async fn serve_webhook(config: &Config, queues: EventQueues) -> Result<()> {
    let state = Arc::new(WebhookState {
        queues,
        verification_token: config.lark.verification_token.clone(),
    });
    let app = transport::router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Webhook receiver listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Webhook receiver shut down");
    Ok(())
}

/// Hold the adapter connection until reconnecting gives up.
pub async fn run_stream(config: &Config, queues: EventQueues) -> Result<()> {
    let Some(endpoint) = config.websocket_endpoint.clone() else {
        bail!("no websocket adapter endpoint configured");
    };
    let frame = RegistrationFrame {
        app_id: config.lark.app_id.clone(),
        verification_token: config.lark.verification_token.clone(),
        encrypt_key: config.lark.encrypt_key.clone(),
    };
    let client = StreamClient::new(endpoint, &frame, queues)?.with_backoff(config.reconnect.clone());
    client.run().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}

// ============================================================================
// Tests
// ============================================================================
