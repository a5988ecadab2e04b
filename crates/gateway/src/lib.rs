//! HTTP API gateway for colonylab.
//!
//! Exposes the plate pipeline and the structured analysis under `/api/v1`,
//! plus health and prompt introspection endpoints.
//!
//! Built on Axum.

pub mod api_v1;
pub mod cache;
pub mod error;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use chrono::{DateTime, Utc};
use colonylab_analysis::{BacterialPlateAnalysis, PlateAnalyzer, PlatePipeline};
use colonylab_callbacks::{ResendMailer, ReviewCallback, ReviewSettings};
use colonylab_config::Settings;
use colonylab_core::callback::CallbackRegistry;
use colonylab_core::error::Error;
use colonylab_core::provider::Provider;
use colonylab_core::tool::ToolRegistry;
use colonylab_database::D1Client;
use colonylab_prompts::PromptStore;
use colonylab_providers::{CompletionModel, OpenAiCompatProvider, RetryProvider};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::{CompressionLayer, predicate::SizeAbove};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

use crate::api_v1::CompletionResponse;
use crate::cache::ResponseCache;

/// Responses smaller than this are sent uncompressed.
const GZIP_MIN_BYTES: u16 = 1000;
const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Shared application state for the gateway.
pub struct AppState {
    pub pipeline: PlatePipeline,
    pub analyzer: PlateAnalyzer,
    pub prompts: Arc<PromptStore>,
    pub completions: ResponseCache<CompletionResponse>,
    pub analyses: ResponseCache<BacterialPlateAnalysis>,
    pub version: String,
    pub start_time: DateTime<Utc>,
    pub max_upload_bytes: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Assemble the state from its parts, with a 60 s cache and a 10 MiB
    /// upload limit.
    pub fn new(
        model: CompletionModel,
        prompts: Arc<PromptStore>,
        tools: Arc<ToolRegistry>,
        callbacks: CallbackRegistry,
    ) -> Self {
        let analyzer = PlateAnalyzer::new(model.provider().clone(), model.model(), tools.clone());
        Self {
            pipeline: PlatePipeline::new(model, prompts.clone(), tools, callbacks),
            analyzer,
            prompts,
            completions: ResponseCache::new(Duration::from_secs(60)),
            analyses: ResponseCache::new(Duration::from_secs(60)),
            version: Settings::version().to_string(),
            start_time: Utc::now(),
            max_upload_bytes: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.completions = ResponseCache::new(ttl);
        self.analyses = ResponseCache::new(ttl);
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Build every subsystem from settings: the retrying model client,
    /// prompts, plate tools and the review callback.
    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let api_key = settings.require_api_key().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let provider: Arc<dyn Provider> = Arc::new(RetryProvider::new(
            Arc::new(OpenAiCompatProvider::new(
                "openai",
                &settings.model.base_url,
                api_key,
            )?),
            settings.model.max_retries,
            Duration::from_secs(settings.model.retry_delay_secs),
        ));
        let model = CompletionModel::new(provider, &settings.model.name)
            .with_temperature(settings.model.temperature)
            .with_max_tokens(settings.model.max_tokens);

        let prompts = Arc::new(PromptStore::load_or_embedded(settings.prompts_path.as_deref())?);
        let tools = Arc::new(colonylab_tools::default_registry());
        let callbacks = callback_registry(settings)?;

        Ok(Self::new(model, prompts, tools, callbacks)
            .with_cache_ttl(Duration::from_secs(settings.gateway.cache_ttl_secs))
            .with_max_upload_bytes(settings.gateway.max_upload_bytes))
    }
}

/// The review callback needs a mail key; the team directory is optional.
fn callback_registry(settings: &Settings) -> Result<CallbackRegistry, Error> {
    let Some(resend_key) = settings.mail.resend_api_key.as_deref() else {
        warn!("RESEND_API_KEY not set, review callbacks are disabled");
        return Ok(CallbackRegistry::new());
    };

    let mut review = ReviewCallback::new(
        Arc::new(ResendMailer::new(resend_key)?),
        ReviewSettings {
            from: settings.mail.from.clone(),
            fallback_to: settings.mail.fallback_to.clone(),
            cc: settings.mail.cc.clone(),
        },
    )?;

    match settings.database() {
        Some(creds) => {
            let db = D1Client::new(&creds.account_id, &creds.database_id, creds.api_token)?;
            review = review.with_directory(Arc::new(db));
        }
        None => warn!("Cloudflare D1 not configured, reviews go to the fallback address"),
    }

    Ok(colonylab_callbacks::default_registry(review))
}

/// Build the full router.
///
/// Layers applied:
/// - Request body size limit
/// - Gzip compression for responses of 1000 bytes or more
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .nest("/api/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(limit))
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(GZIP_MIN_BYTES)))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", settings.gateway.host, settings.gateway.port);
    let state = Arc::new(AppState::from_settings(&settings)?);
    info!(
        prompts = ?state.prompts.names(),
        model = %settings.model.name,
        "Gateway state ready"
    );

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_v1::{PingResponse, PromptListResponse};
    use crate::error::ErrorResponse;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use colonylab_core::callback::{Callback, CallbackInvocation, CallbackKind, CallbackOutcome};
    use colonylab_core::error::{CallbackError, ProviderError};
    use colonylab_core::message::Message;
    use colonylab_core::provider::{ProviderRequest, ProviderResponse};
    use http_body_util::BodyExt;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "colonylab-test-boundary";

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<Message, ProviderError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<Message, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "script exhausted".into(),
                })
            })?;
            Ok(ProviderResponse {
                message: reply,
                usage: None,
                model: request.model,
            })
        }
    }

    struct CountingReview(Mutex<usize>);

    #[async_trait]
    impl Callback for CountingReview {
        fn kind(&self) -> CallbackKind {
            CallbackKind::Review
        }

        async fn execute(&self, _invocation: CallbackInvocation) -> Result<CallbackOutcome, CallbackError> {
            *self.0.lock().unwrap() += 1;
            Ok(CallbackOutcome {
                name: CallbackKind::Review,
                data: serde_json::json!({}),
            })
        }
    }

    fn pipeline_script(signs: &str) -> Vec<Result<Message, ProviderError>> {
        vec![
            Ok(Message::assistant("")),
            Ok(Message::assistant("Clustered cream colonies.")),
            Ok(Message::assistant("# Plate report\n\nClustered cream colonies.")),
            Ok(Message::assistant(signs)),
        ]
    }

    fn app_with(provider: Arc<ScriptedProvider>, callbacks: CallbackRegistry) -> Router {
        let state = AppState::new(
            CompletionModel::new(provider, "gpt-4.1-mini"),
            Arc::new(PromptStore::embedded().unwrap()),
            Arc::new(colonylab_tools::default_registry()),
            callbacks,
        );
        build_router(Arc::new(state))
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 180, 40]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(uri: &str, field: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"plate\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let app = app_with(ScriptedProvider::new(vec![]), CallbackRegistry::new());
        let req = Request::builder()
            .uri("/api/v1/ping")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let ping: PingResponse = json_body(response).await;
        assert_eq!(ping.status, "ok");
        assert!(ping.uptime >= 0);
        assert!(ping.timestamp > 0);
    }

    #[tokio::test]
    async fn completion_returns_markdown_and_caches_it() {
        let provider = ScriptedProvider::new(pipeline_script(r#"{"signs": []}"#));
        let app = app_with(provider.clone(), CallbackRegistry::new());
        let png = png_bytes();

        let response = app
            .clone()
            .oneshot(upload("/api/v1/completion", "file", "image/png", &png))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: CompletionResponse = json_body(response).await;
        assert_eq!(body.data, "# Plate report\n\nClustered cream colonies.");
        assert_eq!(provider.calls(), 4);

        // Same bytes again: no new model calls.
        let response = app
            .oneshot(upload("/api/v1/completion", "file", "image/png", &png))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn completion_runs_review_callback() {
        let provider = ScriptedProvider::new(pipeline_script(
            r#"{"signs": [{"type": "callback", "name": "review", "parameters": {"Name": "Marie"}}]}"#,
        ));
        let review = Arc::new(CountingReview(Mutex::new(0)));
        let mut callbacks = CallbackRegistry::new();
        callbacks.register(review.clone());

        let response = app_with(provider, callbacks)
            .oneshot(upload("/api/v1/completion", "file", "image/png", &png_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*review.0.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_callback_is_bad_request() {
        let provider = ScriptedProvider::new(pipeline_script(
            r#"{"signs": [{"type": "callback", "name": "bucket", "parameters": {}}]}"#,
        ));
        let response = app_with(provider, CallbackRegistry::new())
            .oneshot(upload("/api/v1/completion", "file", "image/png", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json_body(response).await;
        assert_eq!(body.error, "CallbackNotFoundError");
        assert_eq!(body.code, "CALLBACK_ERROR");
        assert!(body.message.contains("bucket"));
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_before_any_model_call() {
        let provider = ScriptedProvider::new(vec![]);
        let response = app_with(provider.clone(), CallbackRegistry::new())
            .oneshot(upload("/api/v1/completion", "file", "image/gif", b"GIF89a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = json_body(response).await;
        assert_eq!(body.code, "INVALID_INPUT");
        assert!(body.message.contains("Image format not supported."));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let response = app_with(ScriptedProvider::new(vec![]), CallbackRegistry::new())
            .oneshot(upload("/api/v1/completion", "photo", "image/png", &png_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn undecodable_image_is_bad_request() {
        let response = app_with(ScriptedProvider::new(vec![]), CallbackRegistry::new())
            .oneshot(upload("/api/v1/completion", "file", "image/jpeg", b"not a jpeg at all"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_is_bad_gateway() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]);
        let response = app_with(provider, CallbackRegistry::new())
            .oneshot(upload("/api/v1/completion", "file", "image/png", &png_bytes()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = json_body(response).await;
        assert_eq!(body.error, "CompletionError");
        assert_eq!(body.code, "COMPLETION_ERROR");
    }

    #[tokio::test]
    async fn analysis_returns_structured_json() {
        let analysis = serde_json::json!({
            "sample_info": {"substrate": "LB agar", "origin": "swab", "incubation_hours": 24, "camera_distance_cm": 20.0},
            "cfu_analysis": {"estimated_total_cfu": 10, "detection_confidence": 0.7,
                             "colony_groups": [{"morphotype": "cream", "count": 10}]},
            "diagnostic_hint": "Single morphotype.",
            "report_quality": {"image_quality_score": 0.8, "lighting_conditions": "even", "detection_completeness": "full"},
            "metadata": {"model_version": "gpt-4.1-mini", "processed_by": "colonylab", "review_recommended": false}
        });
        let provider = ScriptedProvider::new(vec![Ok(Message::assistant(analysis.to_string()))]);

        let response = app_with(provider, CallbackRegistry::new())
            .oneshot(upload("/api/v1/analysis", "file", "image/png", &png_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: BacterialPlateAnalysis = json_body(response).await;
        assert_eq!(body.shannon_diversity_index, Some(0.0));
        assert!(body.image_id.starts_with("img_"));
    }

    #[tokio::test]
    async fn prompts_are_listed_with_placeholders() {
        let req = Request::builder()
            .uri("/api/v1/prompts")
            .body(Body::empty())
            .unwrap();
        let response = app_with(ScriptedProvider::new(vec![]), CallbackRegistry::new())
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: PromptListResponse = json_body(response).await;
        assert_eq!(body.count, 3);
        let analyzer = body
            .prompts
            .iter()
            .find(|p| p.name == "colony_analyzer")
            .unwrap();
        assert_eq!(analyzer.placeholders, vec!["tool_results"]);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let state = AppState::new(
            CompletionModel::new(ScriptedProvider::new(vec![]), "m"),
            Arc::new(PromptStore::embedded().unwrap()),
            Arc::new(ToolRegistry::new()),
            CallbackRegistry::new(),
        )
        .with_max_upload_bytes(64);
        let response = build_router(Arc::new(state))
            .oneshot(upload("/api/v1/completion", "file", "image/png", &[0u8; 512]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn from_settings_requires_api_key() {
        let err = AppState::from_settings(&Settings::default()).err().unwrap();
        assert_eq!(err.code(), colonylab_core::ErrorCode::ClientInitializationError);
    }
}
