//! The plate pipeline: four model passes over one image, then callbacks.
//!
//! 1. tool pass: the model may call the plate tools, which are executed here;
//! 2. analysis pass: `colony_analyzer` with the tool results as context;
//! 3. report pass: `colony_report_writer` turns the analysis into Markdown;
//! 4. sign pass: `sign_detector` reads the board next to the plate as JSON.
//!
//! Every `callback` sign is then run with its parameters and the report.

use colonylab_core::callback::{Callback, CallbackInvocation, CallbackOutcome, CallbackRegistry};
use colonylab_core::error::Error;
use colonylab_core::tool::ToolRegistry;
use colonylab_prompts::{COLONY_ANALYZER, COLONY_REPORT_WRITER, PromptStore, PromptVars, SIGN_DETECTOR};
use colonylab_providers::{CompletionData, CompletionModel, GenerateOptions, strip_code_fences};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::upload::PreparedImage;
use crate::models::ToolInteraction;
use crate::signs::{Action, SignDetection, parse_signs};

const TOOL_PASS_INSTRUCTION: &str = "Use the following tools to analyze the bacterial plate.";
const ANALYSIS_REQUEST: &str = "Write a detailed report about the bacterial plate analysis.";

/// The result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PlateReport {
    /// The Markdown report
    pub data: String,
    pub signs: Vec<SignDetection>,
    pub callbacks: Vec<CallbackOutcome>,
    pub tool_results: Vec<ToolInteraction>,
}

pub struct PlatePipeline {
    model: CompletionModel,
    prompts: Arc<PromptStore>,
    tools: Arc<ToolRegistry>,
    callbacks: CallbackRegistry,
}

impl PlatePipeline {
    pub fn new(
        model: CompletionModel,
        prompts: Arc<PromptStore>,
        tools: Arc<ToolRegistry>,
        callbacks: CallbackRegistry,
    ) -> Self {
        Self {
            model,
            prompts,
            tools,
            callbacks,
        }
    }

    pub fn prompts(&self) -> &PromptStore {
        &self.prompts
    }

    #[instrument(skip_all, fields(model = %self.model.model()))]
    pub async fn run(&self, image: &PreparedImage) -> Result<PlateReport, Error> {
        let images = vec![image.data_url.clone()];

        let (tool_context, tool_results) = self.tool_pass(&images).await?;

        let mut vars = PromptVars::new();
        vars.insert("tool_results".into(), tool_context);
        let analyzer = self.prompts.render(COLONY_ANALYZER, &vars)?;
        let analysis = self
            .model
            .generate(
                ANALYSIS_REQUEST,
                GenerateOptions::default().system(analyzer).images(images.clone()),
            )
            .await?
            .as_text();
        debug!(chars = analysis.len(), "Analysis pass done");

        let writer = self.prompts.render_plain(COLONY_REPORT_WRITER)?;
        let report = self
            .model
            .generate(
                &format!("{ANALYSIS_REQUEST} This is the analysis result: {analysis}"),
                GenerateOptions::default().system(writer).images(images.clone()),
            )
            .await?
            .as_text();
        let markdown = strip_code_fences(&report).to_string();

        let detector = self.prompts.render_plain(SIGN_DETECTOR)?;
        let detected = self
            .model
            .generate("", GenerateOptions::default().system(detector).images(images).json())
            .await?;
        let signs = match &detected.data {
            CompletionData::Json(value) => parse_signs(value),
            _ => Vec::new(),
        };
        info!(signs = signs.len(), "Signs detected");

        let callbacks = self.run_callbacks(&signs, &markdown).await?;

        Ok(PlateReport {
            data: markdown,
            signs,
            callbacks,
            tool_results,
        })
    }

    /// Let the model call the plate tools. Returns the text handed to the
    /// analysis prompt and the recorded interactions.
    async fn tool_pass(&self, images: &[String]) -> Result<(String, Vec<ToolInteraction>), Error> {
        let completion = self
            .model
            .generate(
                "",
                GenerateOptions::default()
                    .system(TOOL_PASS_INSTRUCTION)
                    .images(images.to_vec())
                    .tools(self.tools.definitions()),
            )
            .await?;

        let CompletionData::ToolCalls { calls, .. } = &completion.data else {
            return Ok((completion.as_text(), Vec::new()));
        };

        let results = self.tools.execute_all(calls).await;
        let interactions: Vec<ToolInteraction> = calls
            .iter()
            .zip(results)
            .map(|(call, result)| ToolInteraction {
                tool_call_id: Some(call.id.clone()),
                function_name: call.name.clone(),
                arguments: call.arguments.clone(),
                response: result
                    .data
                    .unwrap_or(serde_json::Value::String(result.output)),
            })
            .collect();
        info!(calls = interactions.len(), "Plate tools executed");

        Ok((serde_json::to_string(&interactions)?, interactions))
    }

    /// Resolve every callback sign before running any, so an unknown name
    /// fails the request without side effects.
    async fn run_callbacks(
        &self,
        signs: &[SignDetection],
        report: &str,
    ) -> Result<Vec<CallbackOutcome>, Error> {
        let resolved = signs
            .iter()
            .filter(|sign| sign.kind == Action::Callback)
            .map(|sign| Ok((self.callbacks.resolve(&sign.name)?, &sign.parameters)))
            .collect::<Result<Vec<(Arc<dyn Callback>, &BTreeMap<String, String>)>, Error>>()?;

        let mut outcomes = Vec::with_capacity(resolved.len());
        for (callback, parameters) in resolved {
            let outcome = callback
                .execute(CallbackInvocation {
                    parameters: parameters.clone(),
                    data: report.to_string(),
                })
                .await?;
            info!(callback = %outcome.name, "Callback executed");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use async_trait::async_trait;
    use colonylab_core::callback::CallbackKind;
    use colonylab_core::error::CallbackError;
    use colonylab_core::message::{Message, MessageToolCall, Role};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReview {
        seen: Mutex<Vec<CallbackInvocation>>,
    }

    #[async_trait]
    impl Callback for RecordingReview {
        fn kind(&self) -> CallbackKind {
            CallbackKind::Review
        }

        async fn execute(&self, invocation: CallbackInvocation) -> Result<CallbackOutcome, CallbackError> {
            self.seen.lock().unwrap().push(invocation);
            Ok(CallbackOutcome {
                name: CallbackKind::Review,
                data: serde_json::json!({"recipient": "marie@lab.org"}),
            })
        }
    }

    fn image() -> PreparedImage {
        PreparedImage {
            data_url: "data:image/png;base64,AAAA".into(),
            mirrored: false,
            width: 1,
            height: 1,
        }
    }

    fn tool_call_message() -> Message {
        let mut message = Message::assistant("");
        message.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "analyze_colony_distribution".into(),
            arguments: r#"{"distribution":"clustered"}"#.into(),
        }];
        message
    }

    fn pipeline(
        provider: Arc<ScriptedProvider>,
        review: Option<Arc<RecordingReview>>,
    ) -> PlatePipeline {
        let mut callbacks = CallbackRegistry::new();
        if let Some(review) = review {
            callbacks.register(review);
        }
        PlatePipeline::new(
            CompletionModel::new(provider, "gpt-4.1-mini"),
            Arc::new(PromptStore::embedded().unwrap()),
            Arc::new(colonylab_tools::default_registry()),
            callbacks,
        )
    }

    #[tokio::test]
    async fn runs_all_passes_and_review_callback() {
        let provider = ScriptedProvider::new(vec![
            tool_call_message(),
            Message::assistant("Two clustered morphotypes."),
            Message::assistant("```markdown\n# Plate report\n\nClustered.\n```"),
            Message::assistant(
                r#"{"signs":[{"type":"callback","name":"review","parameters":{"Name":"Marie"}}]}"#,
            ),
        ]);
        let review = Arc::new(RecordingReview::default());

        let report = pipeline(provider.clone(), Some(review.clone()))
            .run(&image())
            .await
            .unwrap();

        assert_eq!(report.data, "# Plate report\n\nClustered.");
        assert_eq!(report.tool_results.len(), 1);
        assert_eq!(report.tool_results[0].response["distribution"], "clustered");
        assert_eq!(report.callbacks.len(), 1);

        let seen = review.seen.lock().unwrap();
        assert_eq!(seen[0].parameters["Name"], "Marie");
        assert_eq!(seen[0].data, report.data);

        let requests = provider.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].tools.len(), 4);
        assert_eq!(requests[0].messages[0].content, TOOL_PASS_INSTRUCTION);
        // Tool results reach the analyzer's system prompt.
        assert!(requests[1].messages[0].content.contains("\"function_name\":\"analyze_colony_distribution\""));
        assert!(requests[2].messages[1].content.ends_with("Two clustered morphotypes."));
        assert!(requests[3].response_format.is_some());
        assert!(requests.iter().all(|r| r.messages[1].role == Role::User && r.messages[1].images.len() == 1));
    }

    #[tokio::test]
    async fn text_from_tool_pass_is_used_as_context() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant("No tool needed."),
            Message::assistant("analysis"),
            Message::assistant("# Report"),
            Message::assistant(r#"{"signs":[]}"#),
        ]);
        let report = pipeline(provider.clone(), None).run(&image()).await.unwrap();

        assert!(report.tool_results.is_empty());
        assert!(report.callbacks.is_empty());
        assert!(provider.requests()[1].messages[0].content.contains("No tool needed."));
    }

    #[tokio::test]
    async fn unknown_callback_fails_before_any_runs() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant(""),
            Message::assistant("analysis"),
            Message::assistant("# Report"),
            Message::assistant(
                r#"{"signs":[
                    {"type":"callback","name":"review","parameters":{}},
                    {"type":"callback","name":"bucket","parameters":{}}
                ]}"#,
            ),
        ]);
        let review = Arc::new(RecordingReview::default());

        let err = pipeline(provider, Some(review.clone()))
            .run(&image())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Callback(CallbackError::NotFound(ref n)) if n == "bucket"));
        assert!(review.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_signs_are_ignored() {
        let provider = ScriptedProvider::new(vec![
            Message::assistant(""),
            Message::assistant("analysis"),
            Message::assistant("# Report"),
            Message::assistant(r#"{"signs":[{"type":"tool","name":"count","parameters":{}}]}"#),
        ]);
        let report = pipeline(provider, None).run(&image()).await.unwrap();
        assert_eq!(report.signs.len(), 1);
        assert!(report.callbacks.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let provider = ScriptedProvider::new(vec![Message::assistant("")]);
        let err = pipeline(provider, None).run(&image()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
