use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod app;
mod dispatch;
mod http;

#[derive(Parser, Debug)]
#[command(name = "tolan-gateway", about = "Feishu group assistant gateway")]
struct Cli {
    /// Path to tolan.toml (environment variables still override).
    #[arg(long)]
    config: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = tolan_core::config::TolanConfig::load(cli.config.as_deref())
        .unwrap_or_else(|e| {
            eprintln!("Config load failed ({e}), using defaults");
            tolan_core::config::TolanConfig::default()
        });
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tolan_gateway={0},tolan_engine={0},tower_http=warn", config.log_level)
                    .into()
            }),
        )
        .init();

    // Required credentials gate startup; everything else degrades.
    let missing = config.missing_keys();
    if !missing.is_empty() {
        anyhow::bail!("missing required configuration: {}", missing.join(", "));
    }

    let store = if config.database_url.is_empty() {
        warn!("DATABASE_URL not set, persistence disabled");
        None
    } else {
        match tolan_store::MessageStore::open(&config.database_url) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "database unavailable, running on in-memory state");
                None
            }
        }
    };

    let chat: Arc<dyn tolan_feishu::ChatClient> =
        Arc::new(tolan_feishu::FeishuClient::from_config(&config));
    let bind = config.bind.clone();
    let port = config.port;
    let engine = Arc::new(tolan_engine::Engine::new(config, chat, store));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let _dispatcher = dispatch::spawn_dispatcher(Arc::clone(&engine), events_rx);
    let _scheduler = tolan_engine::spawn_periodic_summaries(Arc::clone(&engine));

    let state = Arc::new(app::AppState { engine, events_tx });
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("Tolan gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
