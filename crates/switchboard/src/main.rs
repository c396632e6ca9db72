//! # switchboard
//!
//! Switchboard hub binary: loads settings, wires the built-in collaborators
//! and starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use switchboard_core::logging::{LogFormat, init_subscriber};
use switchboard_server::auth::StaticTokenAuthenticator;
use switchboard_server::config::ServerConfig;
use switchboard_server::membership::StaticMembership;
use switchboard_server::rpc::handlers::register_all;
use switchboard_server::rpc::registry::ActionRegistry;
use switchboard_server::server::HubServer;
use switchboard_settings::{SwitchboardSettings, load_settings_from_path, settings_path};

/// Switchboard realtime hub.
#[derive(Parser, Debug)]
#[command(name = "switchboard", about = "Switchboard realtime WebSocket hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.switchboard/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Load settings and apply command-line overrides on top.
    fn resolve_settings(&self) -> Result<SwitchboardSettings> {
        let path = self.settings.clone().unwrap_or_else(settings_path);
        let mut settings = load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

/// Build the server from resolved settings. Must run inside a Tokio runtime.
fn build_server(settings: &SwitchboardSettings) -> HubServer {
    let config = ServerConfig::from_settings(&settings.server);
    let mut registry = ActionRegistry::new().with_timeout(config.handler_timeout());
    register_all(&mut registry);

    let authenticator = Arc::new(StaticTokenAuthenticator::new(settings.auth.tokens.clone()));
    let membership = Arc::new(StaticMembership::from_channels(&settings.channels));
    HubServer::new(config, registry, authenticator, membership)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    init_subscriber(
        &settings.logging.level,
        LogFormat::from_str_lossy(&settings.logging.format),
    );

    if settings.auth.tokens.is_empty() {
        tracing::warn!("no auth tokens configured; every upgrade will be rejected");
    }

    let mut server = build_server(&settings);
    match switchboard_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable; /metrics disabled"),
    }

    let (addr, handle) = server.listen().await.context("Failed to start server")?;
    tracing::info!(
        %addr,
        channels = settings.channels.len(),
        actions = ?server.registry().actions(),
        "switchboard ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let mut handles = vec![handle];
    handles.extend(server.take_hub_task());
    server.shutdown().graceful_shutdown(handles, None).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
