//! `colonylab mcp`: Serve the lab database to MCP clients over stdio.

use anyhow::Context;
use colonylab_config::Settings;
use colonylab_core::error::{DatabaseError, Error};
use colonylab_database::D1Client;
use colonylab_mcp::{DatabaseTools, McpServer};
use std::path::Path;
use std::sync::Arc;
use tracing::error;

pub async fn run(config: Option<&Path>) -> anyhow::Result<()> {
    let settings = Settings::load(config).context("Failed to load config")?;

    let Some(creds) = settings.database() else {
        let err = Error::Database(DatabaseError::NotConfigured(
            "CLOUDFLARE_API_TOKEN, CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_DB_ID must be set".into(),
        ));
        error!(code = %err.code(), "{err}");
        return Err(err.into());
    };

    let db = D1Client::new(&creds.account_id, &creds.database_id, creds.api_token)?;
    let server = McpServer::new(
        format!("{}-db", settings.name),
        Settings::version(),
        DatabaseTools::new(Arc::new(db)),
    );

    server.serve_stdio().await.context("MCP transport failed")
}
