//! The MCP server: three database tools served over stdio with `rmcp`.

use colonylab_core::error::Error;
use colonylab_database::{QueryFilter, TableName};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::tools::DatabaseTools;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SchemaArgs {
    /// The name of the table to get the schema for
    #[schemars(schema_with = "table_name_schema")]
    pub table_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryArgs {
    #[schemars(schema_with = "query_filter_schema")]
    pub query: QueryFilter,
}

fn table_name_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    let names: Vec<&str> = TableName::ALL.iter().map(|t| t.as_str()).collect();
    schemars::json_schema!({
        "type": "string",
        "enum": names,
        "description": "The name of the table to get the schema for",
    })
}

fn query_filter_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::Schema::try_from(QueryFilter::json_schema()).unwrap_or_default()
}

#[derive(Clone)]
pub struct McpServer {
    name: String,
    version: String,
    tools: Arc<DatabaseTools>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>, tools: DatabaseTools) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: Arc::new(tools),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the list of tables in the Cloudflare D1 database. \
        Use this tool before querying the database.")]
    pub async fn get_database_tables(&self) -> Result<CallToolResult, McpError> {
        Ok(tool_result("get_database_tables", self.tools.tables().await))
    }

    #[tool(description = "Get the schema of a specific table in the Cloudflare D1 database. \
        Use this tool before querying the database.")]
    pub async fn get_database_schema(
        &self,
        Parameters(args): Parameters<SchemaArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result("get_database_schema", self.tools.schema(&args.table_name).await))
    }

    #[tool(description = "Query the Cloudflare D1 database and return data as a string. \
        Use this tool after getting the list of tables or schema. \
        The request must follow the QueryFilter schema.")]
    pub async fn query_db(
        &self,
        Parameters(args): Parameters<QueryArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(tool_result("query_db", self.tools.query(&args.query).await))
    }

    /// Serve on stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> Result<(), Error> {
        info!(name = %self.name, "MCP server listening on stdio");
        let running = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| Error::Internal(format!("MCP initialization failed: {e}")))?;
        let reason = running
            .waiting()
            .await
            .map_err(|e| Error::Internal(format!("MCP service task failed: {e}")))?;
        info!(?reason, "MCP session closed");
        Ok(())
    }
}

/// Database failures go back to the client as error content, not as
/// protocol errors.
fn tool_result(tool: &str, result: Result<String, Error>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            warn!(tool, code = %e.code(), error = %e, "MCP tool failed");
            CallToolResult::error(vec![Content::text(e.to_string())])
        }
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            instructions: Some(
                "Read-only access to the lab database. List tables, read a schema, then query."
                    .into(),
            ),
        }
    }
}
