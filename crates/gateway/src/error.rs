//! Error responses.
//!
//! Every failure is returned as `{error, message, code, details}` with a
//! status derived from the error kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use colonylab_core::error::{CallbackError, Error, PromptError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// An [`Error`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) | Error::Callback(CallbackError::NotFound(_)) => {
                StatusCode::BAD_REQUEST
            }
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> serde_json::Value {
        match &self.0 {
            Error::Prompt(PromptError::NotFound { available, .. }) => {
                serde_json::json!({ "available": available })
            }
            Error::Prompt(PromptError::MissingVariable { prompt, variable }) => {
                serde_json::json!({ "prompt": prompt, "variable": variable })
            }
            _ => serde_json::json!({}),
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.0.code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, %code, "Request failed");
        } else {
            tracing::warn!(error = %self.0, %code, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
            code: code.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonylab_core::error::ProviderError;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ApiError::from(Error::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CallbackError::NotFound("bucket".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CallbackError::Delivery("smtp".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ProviderError::Timeout("slow".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(PromptError::NotFound {
                name: "x".into(),
                available: vec![]
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_variable_details_name_the_variable() {
        let err = ApiError::from(PromptError::MissingVariable {
            prompt: "colony_analyzer".into(),
            variable: "tool_results".into(),
        });
        assert_eq!(err.details()["variable"], "tool_results");
    }
}
