//! Implementation of the `specforge serve` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::http::{SessionsHttpConfig, SessionsHttpServer};
use crate::domain::models::Config;
use crate::infrastructure::setup::build_engine;

/// Arguments for `specforge serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Keep sessions and rules in memory only
    #[arg(long)]
    pub ephemeral: bool,
}

/// Bind the HTTP API and serve until interrupted.
pub async fn execute(args: ServeArgs, config: &Config) -> Result<()> {
    let engine = build_engine(config, args.ephemeral)
        .await
        .context("Failed to start the session engine")?;

    let mut http_config = SessionsHttpConfig::from(&config.server);
    if let Some(host) = args.host {
        http_config.host = host;
    }
    if let Some(port) = args.port {
        http_config.port = port;
    }

    let server = SessionsHttpServer::new(engine.service.clone(), engine.rule_registry(), http_config);
    server
        .serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("HTTP server failed")
}
