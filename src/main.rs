pub mod config;
pub mod engine;
pub mod errors;
pub mod native;
pub mod providers;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tokio::net::TcpListener;
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService,
    session::local::LocalSessionManager,
};

use crate::engine::audit::AuditLogger;
use crate::engine::server::AmassEngine;
use crate::native::process::TokioCommandRunner;
use crate::providers::amass::AmassDispatcher;

/// Fixed serving path for the MCP endpoint.
const MCP_PATH: &str = "/mcp";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("amass_mcp=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting amass-mcp");

    let (config, source) = config::load_config()?;
    match &source {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("No config file found, using defaults"),
    }
    tracing::info!(
        binary = %config.amass.binary,
        timeout_secs = config.amass.timeout_secs,
        max_concurrent = config.amass.max_concurrent,
        "Amass settings"
    );

    let dispatcher = Arc::new(AmassDispatcher::new(&config.amass, Arc::new(TokioCommandRunner)));

    let audit = config.audit.path.as_ref().map(|path| {
        tracing::info!("Audit log: {}", path);
        Arc::new(AuditLogger::new(path))
    });

    let session_manager = LocalSessionManager::default();

    let disp = dispatcher.clone();
    let aud = audit.clone();
    let mcp_service = StreamableHttpService::new(
        move || Ok(AmassEngine::new(disp.clone(), aud.clone())),
        session_manager.into(),
        Default::default(),
    );

    let bind_addr = config.bind_addr();
    let app = Router::new().nest_service(MCP_PATH, mcp_service);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("amass-mcp listening on http://{}{}", bind_addr, MCP_PATH);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("amass-mcp stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
