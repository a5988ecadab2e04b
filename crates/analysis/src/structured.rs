//! Single-prompt structured analysis.
//!
//! The model answers with a [`BacterialPlateAnalysis`] JSON object, calling
//! the plate tools first if it wants to. Tool answers are fed back as tool
//! messages before the final answer is requested.

use chrono::{DateTime, Utc};
use colonylab_core::error::{Error, ProviderError};
use colonylab_core::message::Message;
use colonylab_core::provider::{Provider, ProviderRequest};
use colonylab_core::tool::{ToolCall, ToolRegistry};
use colonylab_providers::strip_code_fences;
use colonylab_tools::{
    ColonyOriginHypothesis, MorphotypeCount, SpatialDistributionType, shannon_index,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::upload::PreparedImage;
use crate::models::{BacterialPlateAnalysis, ToolInteraction};

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 2000;

pub struct PlateAnalyzer {
    provider: Arc<dyn Provider>,
    model: String,
    tools: Arc<ToolRegistry>,
}

impl PlateAnalyzer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            model: model.into(),
            tools,
        }
    }

    /// The instruction sent with the image.
    pub fn instruction() -> String {
        let schema = BacterialPlateAnalysis::FIELD_HINTS
            .iter()
            .map(|(field, hint)| format!("- {field}: {hint}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are an expert microbiologist analyzing an agar plate image. \
             Provide a comprehensive analysis in JSON format according to the following schema. \
             Use tools if needed. Final response must be a single JSON object.\n\n\
             Schema:\n{schema}\n\n\
             Spatial distribution values: {}\n\
             Origin hypothesis values: {}",
            SpatialDistributionType::values().join(", "),
            ColonyOriginHypothesis::values().join(", "),
        )
    }

    fn request(&self, messages: Vec<Message>, with_tools: bool) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = TEMPERATURE;
        request.max_tokens = Some(MAX_TOKENS);
        if with_tools {
            request.tools = self.tools.definitions();
        }
        request
    }

    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn analyze(&self, image: &PreparedImage) -> Result<BacterialPlateAnalysis, Error> {
        let mut messages = vec![Message::user_with_images(
            Self::instruction(),
            vec![image.data_url.clone()],
        )];

        let first = self.provider.complete(self.request(messages.clone(), true)).await?;
        let mut interactions = Vec::new();

        let content = if first.message.tool_calls.is_empty() {
            first.message.content
        } else {
            let calls = first
                .message
                .tool_calls
                .iter()
                .map(|tc| {
                    let arguments = serde_json::from_str(&tc.arguments).map_err(|e| {
                        ProviderError::InvalidResponse(format!(
                            "Arguments for tool call '{}' are not JSON: {e}",
                            tc.name
                        ))
                    })?;
                    Ok(ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments,
                    })
                })
                .collect::<Result<Vec<_>, ProviderError>>()?;
            messages.push(first.message);

            for (call, result) in calls.iter().zip(self.tools.execute_all(&calls).await) {
                messages.push(Message::tool_result(&call.id, &result.output));
                interactions.push(ToolInteraction {
                    tool_call_id: Some(call.id.clone()),
                    function_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    response: result.data.unwrap_or(serde_json::Value::Null),
                });
            }
            debug!(calls = interactions.len(), "Tool answers sent back");

            self.provider
                .complete(self.request(messages, false))
                .await?
                .message
                .content
        };

        let parsed: serde_json::Value = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| ProviderError::InvalidResponse(format!("Plate analysis is not JSON: {e}")))?;

        let analysis = finalize(parsed, interactions, Utc::now())?;
        info!(image_id = %analysis.image_id, "Plate analysis complete");
        Ok(analysis)
    }
}

/// Fill in what the model leaves out and recompute the diversity index.
pub fn finalize(
    mut value: serde_json::Value,
    mut interactions: Vec<ToolInteraction>,
    now: DateTime<Utc>,
) -> Result<BacterialPlateAnalysis, Error> {
    let Some(object) = value.as_object_mut() else {
        return Err(ProviderError::InvalidResponse("Plate analysis is not a JSON object".into()).into());
    };

    let groups: Vec<MorphotypeCount> = object
        .get("cfu_analysis")
        .and_then(|cfu| cfu.get("colony_groups"))
        .and_then(|groups| groups.as_array())
        .map(|groups| {
            groups
                .iter()
                .filter_map(|g| {
                    Some(MorphotypeCount {
                        morphotype: g.get("morphotype")?.as_str()?.to_string(),
                        count: g.get("count")?.as_i64()?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if !groups.is_empty() {
        let counted: Vec<MorphotypeCount> = groups.into_iter().filter(|g| g.count > 0).collect();
        let summary = shannon_index(&counted)?;
        object.insert(
            "shannon_diversity_index".into(),
            serde_json::json!(summary.shannon_index),
        );
        interactions.push(ToolInteraction {
            tool_call_id: None,
            function_name: "compute_shannon_index".into(),
            arguments: serde_json::json!({ "colony_groups": counted }),
            response: serde_json::to_value(&summary)?,
        });
    }

    if !interactions.is_empty() {
        object.insert("tool_interactions".into(), serde_json::to_value(&interactions)?);
    }

    let blank = |object: &serde_json::Map<String, serde_json::Value>, key: &str| {
        object
            .get(key)
            .is_none_or(|v| v.is_null() || v.as_str().is_some_and(str::is_empty))
    };
    if blank(object, "image_id") {
        object.insert(
            "image_id".into(),
            format!("img_{}", now.format("%Y%m%d%H%M%S%6f")).into(),
        );
    }
    if blank(object, "analysis_timestamp") {
        object.insert("analysis_timestamp".into(), now.to_rfc3339().into());
    }

    serde_json::from_value(value)
        .map_err(|e| ProviderError::InvalidResponse(format!("Plate analysis does not match the schema: {e}")).into())
}
