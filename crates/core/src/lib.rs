//! # colonylab core
//!
//! Domain types, traits, and error definitions shared by every colonylab crate.
//! This crate has **no framework dependencies**: it defines the seams
//! (providers, tools, callbacks) that the other crates implement against.

pub mod callback;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use callback::{Callback, CallbackInvocation, CallbackKind, CallbackOutcome, CallbackRegistry};
pub use error::{Error, ErrorCode, Result};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
