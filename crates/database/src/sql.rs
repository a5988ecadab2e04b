//! SQLite SELECT compiler for [`QueryFilter`].
//!
//! Identifiers are checked against `[A-Za-z_][A-Za-z0-9_]*` and double-quoted;
//! values are rendered as escaped literals. Nothing from the caller reaches
//! the SQL text unvalidated.

use colonylab_core::error::DatabaseError;
use serde_json::Value;

use crate::query::{FilterElement, QueryFilter};

const COMPARISON_OPERATORS: &[&str] = &["=", "!=", "<>", ">", "<", ">=", "<=", "LIKE"];

pub struct SqlGenerator;

impl SqlGenerator {
    /// Quote a bare identifier, rejecting anything that is not a plain name.
    pub fn quote_identifier(identifier: &str) -> Result<String, DatabaseError> {
        let mut chars = identifier.chars();
        let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(DatabaseError::UnsafeIdentifier(identifier.to_string()));
        }
        Ok(format!("\"{identifier}\""))
    }

    /// Qualify `field` with `default_table` unless it is already `table.column`.
    /// `*` and `table.*` are accepted as column wildcards.
    pub fn qualify(field: &str, default_table: Option<&str>) -> Result<String, DatabaseError> {
        if let Some((table, column)) = field.split_once('.') {
            let column = if column == "*" {
                "*".to_string()
            } else {
                Self::quote_identifier(column)?
            };
            return Ok(format!("{}.{column}", Self::quote_identifier(table)?));
        }
        if field == "*" {
            return Ok("*".into());
        }
        match default_table {
            Some(table) => Ok(format!(
                "{}.{}",
                Self::quote_identifier(table)?,
                Self::quote_identifier(field)?
            )),
            None => Self::quote_identifier(field),
        }
    }

    /// Render a scalar JSON value as an SQL literal.
    pub fn format_literal(value: &Value) -> Result<String, DatabaseError> {
        match value {
            Value::Null => Ok("NULL".into()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.into()),
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
            other => Err(DatabaseError::InvalidFilter(format!(
                "Unsupported literal: {other}"
            ))),
        }
    }

    /// Compile one condition for a WHERE or ON clause.
    pub fn compile_filter(
        filter: &FilterElement,
        default_table: Option<&str>,
    ) -> Result<String, DatabaseError> {
        let field = Self::qualify(&filter.field, default_table)?;
        let op = filter
            .operator
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        if op == "IN" {
            let Value::Array(values) = &filter.value else {
                return Err(DatabaseError::InvalidFilter(
                    "IN operator requires a list value.".into(),
                ));
            };
            let formatted = values
                .iter()
                .map(Self::format_literal)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            return Ok(format!("{field} IN ({formatted})"));
        }

        if filter.value.is_null() {
            return match op.as_str() {
                "=" | "IS" => Ok(format!("{field} IS NULL")),
                "!=" | "<>" | "IS NOT" => Ok(format!("{field} IS NOT NULL")),
                _ => Err(DatabaseError::UnsupportedOperator(format!(
                    "NULL used with unsupported operator: {op}"
                ))),
            };
        }

        if COMPARISON_OPERATORS.contains(&op.as_str()) {
            return Ok(format!("{field} {op} {}", Self::format_literal(&filter.value)?));
        }

        Err(DatabaseError::UnsupportedOperator(op))
    }

    fn compile_order_by(order_by: &str) -> Result<String, DatabaseError> {
        let mut parts = order_by.split_whitespace();
        let column = parts
            .next()
            .ok_or_else(|| DatabaseError::InvalidFilter("Empty order_by".into()))?;
        let column = Self::qualify(column, None)?;
        match (parts.next().map(str::to_ascii_uppercase), parts.next()) {
            (None, _) => Ok(column),
            (Some(dir), None) if dir == "ASC" || dir == "DESC" => Ok(format!("{column} {dir}")),
            _ => Err(DatabaseError::InvalidFilter(format!(
                "Invalid order_by: {order_by}"
            ))),
        }
    }

    /// Compile a full SELECT statement, terminated with `;`.
    pub fn compile(query: &QueryFilter) -> Result<String, DatabaseError> {
        let base = Self::quote_identifier(&query.base_table)?;
        let from_clause = match &query.base_alias {
            Some(alias) => format!("{base} AS {}", Self::quote_identifier(alias)?),
            None => base,
        };
        let default_table = query.base_alias.as_deref().unwrap_or(&query.base_table);

        let mut join_clauses = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            let join_table = Self::quote_identifier(&join.table)?;
            let join_alias = match &join.alias {
                Some(alias) => Self::quote_identifier(alias)?,
                None => join_table.clone(),
            };
            let join_type = join.join_type.trim().to_ascii_uppercase();
            if join_type != "INNER" && join_type != "LEFT" {
                return Err(DatabaseError::UnsupportedJoin(join_type));
            }
            if join.on.is_empty() {
                return Err(DatabaseError::InvalidFilter(format!(
                    "Join on '{}' has no conditions",
                    join.table
                )));
            }
            let join_default = join.alias.as_deref().unwrap_or(&join.table);
            let on_clause = join
                .on
                .iter()
                .map(|f| Self::compile_filter(f, Some(join_default)))
                .collect::<Result<Vec<_>, _>>()?
                .join(" AND ");
            join_clauses.push(format!(
                "{join_type} JOIN {join_table} AS {join_alias} ON {on_clause}"
            ));
        }

        if query.fields.is_empty() {
            return Err(DatabaseError::InvalidFilter("No fields selected".into()));
        }
        let fields = query
            .fields
            .iter()
            .map(|f| Self::qualify(f, Some(default_table)))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let select = if query.distinct { "SELECT DISTINCT" } else { "SELECT" };
        let mut sql = format!("{select} {fields} FROM {from_clause}");

        if !join_clauses.is_empty() {
            sql.push(' ');
            sql.push_str(&join_clauses.join(" "));
        }

        if !query.filters.is_empty() {
            let where_clause = query
                .filters
                .iter()
                .map(|f| Self::compile_filter(f, Some(default_table)))
                .collect::<Result<Vec<_>, _>>()?
                .join(" AND ");
            sql.push_str(&format!(" WHERE {where_clause}"));
        }

        if !query.group_by.is_empty() {
            let grouped = query
                .group_by
                .iter()
                .map(|f| Self::qualify(f, None))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ");
            sql.push_str(&format!(" GROUP BY {grouped}"));
        }

        if let Some(order_by) = &query.order_by {
            sql.push_str(&format!(" ORDER BY {}", Self::compile_order_by(order_by)?));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        sql.push(';');
        Ok(sql)
    }
}
