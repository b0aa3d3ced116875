//! quire-mcp server entry point.
//!
//! Loads configuration, opens the configured content backend and serves the
//! MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use quire_client::ContentLoader;
use quire_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        backend = ?config.backend,
        locale = %config.default_locale,
        "Starting quire-mcp server on stdio transport"
    );

    let loader = ContentLoader::from_config(&config).await.context("opening content backend")?;
    let handler = handler::QuireServer::new(Arc::new(loader));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
