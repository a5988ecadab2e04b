//! # colonylab MCP server
//!
//! Exposes the lab database to MCP clients over stdio with `rmcp`: list
//! tables, read a table schema and run structured queries. Stdout carries
//! only protocol messages.

pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::DatabaseTools;
