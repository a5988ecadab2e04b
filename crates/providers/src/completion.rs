//! Completion model: one system instruction, one user turn, one answer.
//!
//! Wraps a [`Provider`] with the request shape the analysis passes use and
//! turns the raw assistant message into a typed [`Completion`].

use colonylab_core::error::ProviderError;
use colonylab_core::message::Message;
use colonylab_core::provider::{Provider, ProviderRequest, ResponseFormat, ToolDefinition, Usage};
use colonylab_core::tool::ToolCall;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

/// Per-call options for [`CompletionModel::generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Replaces the model's default system instruction
    pub system_instruction: Option<String>,

    /// Image URLs attached to the user turn
    pub images: Vec<String>,

    /// Ask for a single JSON object and parse it
    pub json: bool,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
}

impl GenerateOptions {
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CompletionData {
    /// Free text
    Text(String),
    /// A parsed JSON object (when JSON output was requested)
    Json(serde_json::Value),
    /// The model asked for tools instead of answering
    ToolCalls { calls: Vec<ToolCall>, content: String },
}

/// The result of one [`CompletionModel::generate`] call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub data: CompletionData,
    pub usage: Option<Usage>,
}

impl Completion {
    /// The text form of the result: the text itself, compact JSON, or the
    /// JSON list of requested tool calls.
    pub fn as_text(&self) -> String {
        match &self.data {
            CompletionData::Text(text) => text.clone(),
            CompletionData::Json(value) => value.to_string(),
            CompletionData::ToolCalls { calls, .. } => {
                serde_json::to_string(calls).unwrap_or_default()
            }
        }
    }
}

/// A model bound to a provider and sampling settings.
#[derive(Clone)]
pub struct CompletionModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl CompletionModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Send `prompt` (plus any images) under a system instruction.
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<Completion, ProviderError> {
        let system = options
            .system_instruction
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        let user = if options.images.is_empty() {
            Message::user(prompt)
        } else {
            Message::user_with_images(prompt, options.images)
        };

        let mut request = ProviderRequest::new(&self.model, vec![Message::system(system), user]);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.tools = options.tools;
        if options.json {
            request.response_format = Some(ResponseFormat::JsonObject);
        }

        let response = self.provider.complete(request).await?;
        let message = response.message;

        if !message.tool_calls.is_empty() {
            let calls = message
                .tool_calls
                .into_iter()
                .map(|tc| {
                    let arguments = serde_json::from_str(&tc.arguments).map_err(|e| {
                        ProviderError::InvalidResponse(format!(
                            "Arguments for tool call '{}' are not JSON: {e}",
                            tc.name
                        ))
                    })?;
                    Ok(ToolCall {
                        id: tc.id,
                        name: tc.name,
                        arguments,
                    })
                })
                .collect::<Result<Vec<_>, ProviderError>>()?;
            debug!(count = calls.len(), "Model requested tool calls");
            return Ok(Completion {
                data: CompletionData::ToolCalls {
                    calls,
                    content: message.content,
                },
                usage: response.usage,
            });
        }

        let data = if options.json {
            let body = strip_code_fences(&message.content);
            let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
                ProviderError::InvalidResponse(format!("Expected a JSON object: {e}"))
            })?;
            if !value.is_object() {
                return Err(ProviderError::InvalidResponse(
                    "Expected a JSON object".into(),
                ));
            }
            CompletionData::Json(value)
        } else {
            CompletionData::Text(message.content)
        };

        Ok(Completion {
            data,
            usage: response.usage,
        })
    }
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json", "markdown") on the opening line.
    let inner = match inner.find('\n') {
        Some(newline) if !inner[..newline].trim().contains(' ') => &inner[newline + 1..],
        _ => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
