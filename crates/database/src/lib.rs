//! Database access for colonylab.
//!
//! Queries are described with [`QueryFilter`], compiled to SQLite by
//! [`SqlGenerator`] and sent to Cloudflare D1 through [`D1Client`]. Any other
//! backend only needs to implement [`Database`].

pub mod client;
pub mod fuzzy;
pub mod query;
pub mod sql;

pub use client::{D1Client, Database, Row, TableName, format_rows};
pub use fuzzy::{TeamMember, fuzzy_find_team_member, levenshtein};
pub use query::{FilterElement, Join, QueryFilter};
pub use sql::SqlGenerator;
