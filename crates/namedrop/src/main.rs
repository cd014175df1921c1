mod config;
mod controller;
mod display;
mod error;
mod gateway;
mod model;
mod parser;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use namedrop_common::gemini::GeminiClient;

use config::Config;
use controller::SearchController;
use gateway::SearchGateway;
use server::NameDropServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP JSON-RPC, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting namedrop MCP server");

    let config = Config::from_env()?;
    info!(
        base_url = %config.gemini.base_url,
        model = %config.gemini.model,
        timeout_ms = config.gemini.default_timeout.as_millis(),
        failure_policy = ?config.failure_policy,
        max_results = config.max_results,
        "configuration loaded"
    );
    if !config.gemini.has_api_key() {
        warn!("GEMINI_API_KEY is not set; every search will fail with a configuration error");
    }

    let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);
    let gateway = Arc::new(SearchGateway::new(
        gemini,
        config.failure_policy,
        config.max_results,
    ));
    let controller = SearchController::new(gateway);

    let server = NameDropServer::new(controller);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
