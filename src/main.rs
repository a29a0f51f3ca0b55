//! Lark → Keycloak directory sync - service binary

use anyhow::Result;
use clap::{Parser, Subcommand};
use lark_keycloak_sync::{Config, EventSource};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lark-keycloak-sync")]
#[command(about = "Mirror the Lark organization into a Keycloak realm")]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true, env = "LARK_SYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive events on the HTTP webhook
    Serve {
        /// Port to listen on (overrides SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Receive events from the streaming socket adapter
    Stream {
        /// Adapter endpoint (overrides WEBSOCKET_ADAPTER_ENDPOINT)
        #[arg(short, long)]
        endpoint: Option<String>,
    },

    /// Use the transport selected by EVENT_RESOURCE
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing: RUST_LOG, then LOG_LEVEL, then the default
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| std::env::var("LOG_LEVEL").map(EnvFilter::new))
        .unwrap_or_else(|_| EnvFilter::new("info,lark_keycloak_sync=debug,tower_http=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve { port } => {
            config.event_source = EventSource::Http;
            if let Some(port) = port {
                config.server_port = port;
            }
        }
        Commands::Stream { endpoint } => {
            config.event_source = EventSource::Websocket;
            if endpoint.is_some() {
                config.websocket_endpoint = endpoint;
            }
        }
        Commands::Run => {}
    }
    config.validate()?;

    tracing::info!(
        event_source = ?config.event_source,
        realm = %config.keycloak.realm,
        "Starting directory sync"
    );
    lark_keycloak_sync::run(config).await
}
