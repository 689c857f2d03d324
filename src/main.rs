//! Overlay proxy binary.
//!
//! Seeds every tarball given on the command line, then serves: seeded paths
//! answer locally, everything else is proxied to the upstream registry. No
//! tarball arguments means pure pass-through proxying.

use anyhow::Result;
use clap::Parser;
use npm_overlay_proxy::{config::DEFAULT_REGISTRY_URL, seed, server, AppState, Config, UpstreamClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "overlay-proxy")]
#[command(about = "Transparent npm registry proxy with local tarball overlays")]
#[command(version)]
struct Cli {
    /// Local package tarballs to overlay onto the upstream registry
    tarballs: Vec<PathBuf>,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = npm_overlay_proxy::config::DEFAULT_PORT)]
    port: u16,

    /// Upstream registry URL
    #[arg(long, env = "npm_config_registry", default_value = DEFAULT_REGISTRY_URL)]
    registry: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.host, cli.port, &cli.registry);

    info!(upstream = %config.registry_url, overlays = cli.tarballs.len(),
        "proxying with local overlays");

    let upstream = Arc::new(UpstreamClient::new((&config).into())?);
    let overlays = seed::assemble_all(&cli.tarballs, &upstream).await?;

    let state = Arc::new(AppState {
        overlays,
        upstream,
        config,
    });
    server::run_server(state).await
}
