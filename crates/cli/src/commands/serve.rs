//! `colonylab serve`: Start the HTTP API server.

use anyhow::Context;
use colonylab_config::Settings;
use std::path::Path;

pub async fn run(config: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut settings = Settings::load(config).context("Failed to load config")?;

    if let Some(port) = port_override {
        settings.gateway.port = port;
    }

    println!("🧫 colonylab API v{}", Settings::version());
    println!("   Listening: {}:{}", settings.gateway.host, settings.gateway.port);
    println!("   Model:     {}", settings.model.name);

    colonylab_gateway::start(settings)
        .await
        .map_err(|e| anyhow::anyhow!("Gateway failed: {e}"))
}
