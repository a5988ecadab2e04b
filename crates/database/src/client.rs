//! Database access: the [`Database`] trait and the Cloudflare D1 client.

use async_trait::async_trait;
use colonylab_core::error::DatabaseError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::query::QueryFilter;
use crate::sql::SqlGenerator;

/// One result row, columns in the order the database returned them.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Tables callers may ask the schema of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    Team,
}

impl TableName {
    pub const ALL: &'static [TableName] = &[TableName::Team];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableName {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "team" => Ok(Self::Team),
            other => Err(DatabaseError::InvalidFilter(format!(
                "Unknown table '{other}'; expected one of: {}",
                Self::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

/// A SQL database reachable by the service.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one SQL statement and return its rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, DatabaseError>;

    /// Compile and run a structured query.
    async fn select(&self, query: &QueryFilter) -> Result<Vec<Row>, DatabaseError> {
        let sql = SqlGenerator::compile(query)?;
        debug!(%sql, "Running structured query");
        self.query(&sql).await
    }

    /// User table names, sorted.
    async fn tables(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = self
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name;",
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    /// `PRAGMA table_info` rows for a known table.
    async fn table_schema(&self, table: TableName) -> Result<Vec<Row>, DatabaseError> {
        let sql = format!(
            "PRAGMA table_info({});",
            SqlGenerator::quote_identifier(table.as_str())?
        );
        self.query(&sql).await
    }
}

/// Render rows as `key: value, key: value`, one row per line.
pub fn format_rows(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(key, value)| match value {
                    serde_json::Value::String(s) => format!("{key}: {s}"),
                    other => format!("{key}: {other}"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cloudflare D1 over its REST API.
pub struct D1Client {
    endpoint: String,
    api_token: String,
    client: reqwest::Client,
}

impl D1Client {
    pub fn new(
        account_id: &str,
        database_id: &str,
        api_token: impl Into<String>,
    ) -> Result<Self, DatabaseError> {
        Self::with_base_url(
            "https://api.cloudflare.com/client/v4",
            account_id,
            database_id,
            api_token,
        )
    }

    /// Point the client at another API root (tests, proxies).
    pub fn with_base_url(
        base_url: &str,
        account_id: &str,
        database_id: &str,
        api_token: impl Into<String>,
    ) -> Result<Self, DatabaseError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| DatabaseError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: format!(
                "{}/accounts/{account_id}/d1/database/{database_id}/query",
                base_url.trim_end_matches('/')
            ),
            api_token: api_token.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn rows_from_envelope(envelope: D1Envelope) -> Result<Vec<Row>, DatabaseError> {
        if !envelope.success {
            let reason = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(DatabaseError::QueryFailed(reason));
        }
        let first = envelope
            .result
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryFailed("Empty result set envelope".into()))?;
        Ok(first.results)
    }
}

#[async_trait]
impl Database for D1Client {
    async fn query(&self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await
            .map_err(|e| DatabaseError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::Network(e.to_string()))?;

        let envelope: D1Envelope = serde_json::from_str(&body).map_err(|e| {
            warn!(status = status.as_u16(), body = %body, "Unexpected D1 response");
            DatabaseError::QueryFailed(format!("HTTP {status}: {e}"))
        })?;

        Self::rows_from_envelope(envelope)
    }
}

#[derive(Debug, Deserialize)]
struct D1Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<D1Message>,
    #[serde(default)]
    result: Vec<D1Result>,
}

#[derive(Debug, Deserialize)]
struct D1Message {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct D1Result {
    #[serde(default)]
    results: Vec<Row>,
}
