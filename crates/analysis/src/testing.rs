//! Test doubles shared by the pipeline tests.

use async_trait::async_trait;
use colonylab_core::error::ProviderError;
use colonylab_core::message::Message;
use colonylab_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers with a fixed sequence of messages and records every request.
/// Fails once the script runs out.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Message>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let message = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            }
        })?;
        Ok(ProviderResponse {
            message,
            usage: None,
            model,
        })
    }
}
