//! Structured query description.
//!
//! Callers (the MCP `query_db` tool, team lookups) never send SQL text; they
//! describe a SELECT with these types and [`crate::SqlGenerator`] compiles it.

use serde::{Deserialize, Serialize};

/// One condition: `field operator value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterElement {
    /// Column name, optionally qualified as `table.column`
    pub field: String,

    /// One of `= != <> > < >= <= LIKE IN IS` and `IS NOT`
    pub operator: String,

    /// A scalar (string, number, bool, null) or, for `IN`, a list of scalars
    #[serde(default)]
    pub value: serde_json::Value,
}

impl FilterElement {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// `INNER` or `LEFT`
    #[serde(default = "default_join_type")]
    pub join_type: String,

    pub on: Vec<FilterElement>,
}

fn default_join_type() -> String {
    "INNER".into()
}

/// A SELECT over one base table with optional joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub base_table: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_alias: Option<String>,

    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    #[serde(default)]
    pub filters: Vec<FilterElement>,

    #[serde(default)]
    pub joins: Vec<Join>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    #[serde(default)]
    pub distinct: bool,

    #[serde(default)]
    pub group_by: Vec<String>,
}

fn default_fields() -> Vec<String> {
    vec!["*".into()]
}

impl QueryFilter {
    /// `SELECT * FROM base_table`.
    pub fn new(base_table: impl Into<String>) -> Self {
        Self {
            base_table: base_table.into(),
            base_alias: None,
            fields: default_fields(),
            filters: Vec::new(),
            joins: Vec::new(),
            order_by: None,
            limit: None,
            distinct: false,
            group_by: Vec::new(),
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: FilterElement) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// JSON schema advertised to MCP clients for the `query` argument.
    pub fn json_schema() -> serde_json::Value {
        let filter = serde_json::json!({
            "type": "object",
            "properties": {
                "field": { "type": "string", "description": "Column, optionally table.column" },
                "operator": {
                    "type": "string",
                    "enum": ["=", "!=", "<>", ">", "<", ">=", "<=", "LIKE", "IN", "IS", "IS NOT"]
                },
                "value": {
                    "description": "Scalar value, or a list of scalars for IN",
                    "anyOf": [
                        { "type": ["string", "number", "boolean", "null"] },
                        { "type": "array", "items": { "type": ["string", "number", "boolean", "null"] } }
                    ]
                }
            },
            "required": ["field", "operator", "value"]
        });

        serde_json::json!({
            "type": "object",
            "properties": {
                "base_table": { "type": "string" },
                "base_alias": { "type": ["string", "null"] },
                "fields": { "type": "array", "items": { "type": "string" }, "default": ["*"] },
                "filters": { "type": "array", "items": filter.clone() },
                "joins": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "table": { "type": "string" },
                            "alias": { "type": ["string", "null"] },
                            "join_type": { "type": "string", "enum": ["INNER", "LEFT"], "default": "INNER" },
                            "on": { "type": "array", "items": filter }
                        },
                        "required": ["table", "on"]
                    }
                },
                "order_by": { "type": ["string", "null"], "description": "Column, optionally followed by ASC or DESC" },
                "limit": { "type": ["integer", "null"], "minimum": 0 },
                "distinct": { "type": "boolean", "default": false },
                "group_by": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["base_table"]
        })
    }
}
