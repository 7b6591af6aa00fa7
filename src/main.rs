//! # signaro
//!
//! Signaling relay binary: loads settings, installs telemetry and serves the
//! relay until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use signaro_core::{
    AllowAll, ConnectPolicy, PeerIdentity, SessionRegistry, StaticTokens, TokenVerifier,
};
use signaro_server::{RelayServer, ServerConfig};
use signaro_settings::SignaroSettings;
use signaro_telemetry::{init_telemetry, TelemetryConfig};

/// WebRTC signaling relay.
#[derive(Parser, Debug)]
#[command(name = "signaro", version, about = "WebRTC signaling relay")]
struct Cli {
    /// Settings file (defaults to `~/.signaro/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Load layered settings, then apply command-line overrides.
    fn load_settings(&self) -> Result<SignaroSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(signaro_settings::settings_path);
        let mut settings = signaro_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

/// Telemetry config from `logging`, including per-module levels.
fn telemetry_config(settings: &SignaroSettings) -> Result<TelemetryConfig> {
    let mut config =
        TelemetryConfig::from_level_name(&settings.logging.level, settings.logging.json)
            .context("Invalid logging.level")?;
    for (module, level) in &settings.logging.module_levels {
        let level: tracing::Level = level
            .parse()
            .with_context(|| format!("Invalid logging.moduleLevels.{module}: {level}"))?;
        config = config.with_module_level(module.as_str(), level);
    }
    Ok(config)
}

fn connect_policy(settings: &SignaroSettings) -> ConnectPolicy {
    ConnectPolicy {
        controller_role: settings.routing.controller_role.clone(),
        default_client: settings
            .routing
            .default_client
            .as_deref()
            .map(PeerIdentity::from),
    }
}

fn token_verifier(settings: &SignaroSettings) -> Arc<dyn TokenVerifier> {
    if settings.auth.enabled {
        Arc::new(StaticTokens::new(settings.auth.tokens.iter().cloned()))
    } else {
        Arc::new(AllowAll)
    }
}

/// Wire a server from settings around a fresh registry.
fn build_server(settings: &SignaroSettings) -> RelayServer {
    let registry = Arc::new(SessionRegistry::new());
    RelayServer::new(
        ServerConfig::from_settings(&settings.server),
        registry,
        connect_policy(settings),
    )
    .with_verifier(token_verifier(settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    let telemetry = telemetry_config(&settings)?;
    init_telemetry(&telemetry).context("Failed to initialize logging")?;

    let mut server = build_server(&settings);
    if settings.logging.metrics_enabled {
        let handle = signaro_server::metrics::install_recorder()
            .context("Failed to install metrics recorder")?;
        server = server.with_metrics(handle);
    }

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!(
        auth = settings.auth.enabled,
        default_client = settings.routing.default_client.as_deref().unwrap_or("-"),
        "signaro listening on ws://{addr}{}",
        settings.server.path
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let timeout = server.config().shutdown_timeout;
    server
        .shutdown()
        .graceful_shutdown(handle, Some(timeout))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
