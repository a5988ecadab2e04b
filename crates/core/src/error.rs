//! Error types for the colonylab domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them and
//! maps every failure onto a stable [`ErrorCode`] for API responses.

use serde::Serialize;
use thiserror::Error;

/// The top-level error type for all colonylab operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Prompt errors ---
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    // --- Callback errors ---
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    // --- Database errors ---
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-readable error codes returned to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CompletionError,
    ToolExecutionError,
    ToolConfigurationError,
    SystemPromptError,
    ClientInitializationError,
    McpDatabaseInitializationError,
    CallbackError,
    DatabaseError,
    InvalidInput,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompletionError => "COMPLETION_ERROR",
            Self::ToolExecutionError => "TOOL_EXECUTION_ERROR",
            Self::ToolConfigurationError => "TOOL_CONFIGURATION_ERROR",
            Self::SystemPromptError => "SYSTEM_PROMPT_ERROR",
            Self::ClientInitializationError => "CLIENT_INITIALIZATION_ERROR",
            Self::McpDatabaseInitializationError => "MCP_DATABASE_INITIALIZATION_ERROR",
            Self::CallbackError => "CALLBACK_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Provider(ProviderError::NotConfigured(_)) => ErrorCode::ClientInitializationError,
            Self::Provider(_) => ErrorCode::CompletionError,
            Self::Tool(ToolError::InvalidArguments(_)) => ErrorCode::ToolConfigurationError,
            Self::Tool(_) => ErrorCode::ToolExecutionError,
            Self::Prompt(_) => ErrorCode::SystemPromptError,
            Self::Callback(_) => ErrorCode::CallbackError,
            Self::Database(DatabaseError::NotConfigured(_)) => {
                ErrorCode::McpDatabaseInitializationError
            }
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Config { .. } => ErrorCode::ClientInitializationError,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::Serialization(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// A short type-like name for the failure, used as the `error` field of
    /// API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "CompletionError",
            Self::Tool(_) => "ToolExecutionError",
            Self::Prompt(PromptError::NotFound { .. }) => "PromptNotFoundError",
            Self::Prompt(_) => "SystemPromptError",
            Self::Callback(CallbackError::NotFound(_)) => "CallbackNotFoundError",
            Self::Callback(_) => "CallbackExecutionError",
            Self::Database(_) => "DatabaseError",
            Self::Config { .. } => "ClientInitializationError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid model output: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum PromptError {
    #[error("Prompt '{name}' not found (available: {})", .available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Prompt '{prompt}' references '{variable}' but no value was supplied")]
    MissingVariable { prompt: String, variable: String },

    #[error("Error rendering prompt template '{prompt}': {reason}")]
    Template { prompt: String, reason: String },

    #[error("Failed to load prompts from {path}: {reason}")]
    Load { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Callback {0} not found")]
    NotFound(String),

    #[error("Invalid callback parameters: {0}")]
    InvalidParameters(String),

    #[error("Callback lookup failed: {0}")]
    Lookup(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Database not configured: {0}")]
    NotConfigured(String),

    #[error("Unsafe identifier: {0}")]
    UnsafeIdentifier(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported join type: {0}")]
    UnsupportedJoin(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.code(), ErrorCode::CompletionError);
    }

    #[test]
    fn prompt_not_found_lists_available() {
        let err = PromptError::NotFound {
            name: "missing".into(),
            available: vec!["colony_analyzer".into(), "sign_detector".into()],
        };
        let text = err.to_string();
        assert!(text.contains("missing"));
        assert!(text.contains("colony_analyzer, sign_detector"));

        let err = Error::from(err);
        assert_eq!(err.code(), ErrorCode::SystemPromptError);
        assert_eq!(err.kind(), "PromptNotFoundError");
    }

    #[test]
    fn unconfigured_database_maps_to_mcp_code() {
        let err = Error::from(DatabaseError::NotConfigured("CLOUDFLARE_DB_ID".into()));
        assert_eq!(err.code(), ErrorCode::McpDatabaseInitializationError);
    }

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::SystemPromptError).unwrap();
        assert_eq!(json, "\"SYSTEM_PROMPT_ERROR\"");
        assert_eq!(
            ErrorCode::McpDatabaseInitializationError.as_str(),
            "MCP_DATABASE_INITIALIZATION_ERROR"
        );
    }

    #[test]
    fn auth_failures_are_not_retryable() {
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
    }
}
