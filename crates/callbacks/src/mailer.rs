//! Outgoing email.

use async_trait::async_trait;
use colonylab_core::error::CallbackError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An email ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `email`, returning the provider's message ID.
    async fn send(&self, email: &Email) -> Result<String, CallbackError>;
}

/// Sends email through the Resend HTTP API.
pub struct ResendMailer {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| CallbackError::Delivery(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            endpoint: "https://api.resend.com/emails".into(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<String, CallbackError> {
        debug!(to = ?email.to, subject = %email.subject, "Sending email");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| CallbackError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Resend rejected email");
            return Err(CallbackError::Delivery(format!("HTTP {status}: {body}")));
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| CallbackError::Delivery(format!("Unexpected Resend response: {e}")))?;
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cc_is_omitted_from_payload() {
        let email = Email {
            from: "Laboratory <lab@example.com>".into(),
            to: vec!["ada@lab.org".into()],
            cc: vec![],
            subject: "s".into(),
            html: "<p>x</p>".into(),
        };
        let json = serde_json::to_value(&email).unwrap();
        assert!(json.get("cc").is_none());
        assert_eq!(json["to"][0], "ada@lab.org");
    }

    #[test]
    fn resend_response_parses_id() {
        let parsed: ResendResponse = serde_json::from_str(r#"{"id":"49a3999c"}"#).unwrap();
        assert_eq!(parsed.id, "49a3999c");
    }
}
