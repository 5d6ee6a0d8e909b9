mod api;
mod boundary;
mod config;
mod credentials;
mod embed;
mod pages;
mod render;
mod sdk;
mod server;
mod telemetry;
mod view;

use crate::config::AppConfig;
use crate::credentials::HttpCredentialLoader;
use crate::embed::PowerBiWidget;
use crate::server::AppState;
use crate::telemetry::GreenticTelemetrySink;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Serves a Power BI report page backed by a local embed-token endpoint.
#[derive(Debug, Parser)]
#[command(name = "powerbi-embed-gui", version, about)]
struct Cli {
    /// Address to listen on (overrides BIND_ADDR).
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Base URL of the embed-token service (overrides EMBED_TOKEN_BASE).
    #[arg(long)]
    token_base: Option<Url>,
    /// Allow cross-origin requests (overrides ENABLE_CORS).
    #[arg(long)]
    cors: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    GreenticTelemetrySink::init();

    let mut config = AppConfig::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(base) = cli.token_base {
        config.token_base_url = base;
    }
    config.enable_cors |= cli.cors;

    let loader = HttpCredentialLoader::new(&config.token_base_url)?;
    tracing::info!(endpoint = %loader.endpoint(), "embed token endpoint");

    let addr = config.bind_addr;
    let state = AppState::new(
        config,
        Arc::new(loader),
        Arc::new(PowerBiWidget),
        Arc::new(GreenticTelemetrySink),
    );

    tracing::info!(%addr, "starting powerbi-embed-gui server");
    server::run(addr, state).await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
