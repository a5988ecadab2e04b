//! The database operations behind the MCP tools.

use colonylab_core::error::Error;
use colonylab_database::{Database, QueryFilter, TableName, format_rows};
use std::sync::Arc;
use tracing::debug;

pub struct DatabaseTools {
    db: Arc<dyn Database>,
}

impl DatabaseTools {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Table names, comma separated.
    pub async fn tables(&self) -> Result<String, Error> {
        Ok(self.db.tables().await?.join(", "))
    }

    /// `PRAGMA table_info` rows as JSON. Only known tables are accepted.
    pub async fn schema(&self, table_name: &str) -> Result<String, Error> {
        let table: TableName = table_name.parse()?;
        let rows = self.db.table_schema(table).await?;
        Ok(serde_json::to_string(&rows)?)
    }

    /// Compile and run `query`, one `column: value` line per row.
    pub async fn query(&self, query: &QueryFilter) -> Result<String, Error> {
        debug!(table = %query.base_table, "MCP query");
        let rows = self.db.select(query).await?;
        Ok(format_rows(&rows))
    }
}
