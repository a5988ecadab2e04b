//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET  /api/v1/ping`: Liveness and version
//! - `POST /api/v1/completion`: Plate photo in, Markdown report out
//! - `POST /api/v1/analysis`: Plate photo in, structured analysis out
//! - `GET  /api/v1/prompts`: Loaded prompt templates and their variables

use axum::{
    Router,
    extract::{Multipart, State},
    response::Json,
    routing::{get, post},
};
use colonylab_analysis::{BacterialPlateAnalysis, ImageMimeType, PreparedImage, digest, prepare_image};
use colonylab_core::error::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::SharedState;
use crate::error::ApiError;

const UPLOAD_FIELD: &str = "file";

/// Build the v1 API router. Nest this under "/api/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/completion", post(completion_handler))
        .route("/analysis", post(analysis_handler))
        .route("/prompts", get(prompts_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub version: String,
    /// Seconds since the service started
    pub uptime: i64,
    /// Unix seconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptInfo {
    pub name: String,
    pub placeholders: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptListResponse {
    pub prompts: Vec<PromptInfo>,
    pub count: usize,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn ping_handler(State(state): State<SharedState>) -> Json<PingResponse> {
    let now = chrono::Utc::now();
    Json(PingResponse {
        status: "ok".into(),
        version: state.version.clone(),
        uptime: now.signed_duration_since(state.start_time).num_seconds(),
        timestamp: now.timestamp(),
    })
}

/// `POST /api/v1/completion`: run the plate pipeline on an upload.
async fn completion_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<CompletionResponse>, ApiError> {
    let bytes = read_upload(multipart).await?;
    let key = format!("completion:{}", digest(&bytes));

    if let Some(cached) = state.completions.get(&key).await {
        debug!(%key, "Completion served from cache");
        return Ok(Json(cached));
    }

    let image = prepare(bytes).await?;
    let report = state.pipeline.run(&image).await?;
    info!(
        chars = report.data.len(),
        callbacks = report.callbacks.len(),
        "Completion generated"
    );

    let response = CompletionResponse { data: report.data };
    state.completions.insert(key, response.clone()).await;
    Ok(Json(response))
}

/// `POST /api/v1/analysis`: structured analysis of an upload.
async fn analysis_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<BacterialPlateAnalysis>, ApiError> {
    let bytes = read_upload(multipart).await?;
    let key = format!("analysis:{}", digest(&bytes));

    if let Some(cached) = state.analyses.get(&key).await {
        debug!(%key, "Analysis served from cache");
        return Ok(Json(cached));
    }

    let image = prepare(bytes).await?;
    let analysis = state.analyzer.analyze(&image).await?;
    state.analyses.insert(key, analysis.clone()).await;
    Ok(Json(analysis))
}

async fn prompts_handler(
    State(state): State<SharedState>,
) -> Result<Json<PromptListResponse>, ApiError> {
    let prompts = state
        .prompts
        .names()
        .into_iter()
        .map(|name| {
            let placeholders = state.prompts.placeholders(&name)?;
            Ok(PromptInfo { name, placeholders })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(PromptListResponse {
        count: prompts.len(),
        prompts,
    }))
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Read the `file` field, accepting only JPEG and PNG uploads.
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if ImageMimeType::from_content_type(&content_type).is_none() {
            return Err(Error::InvalidInput("Image format not supported.".into()).into());
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(format!("Could not read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Uploaded file is empty.".into()).into());
        }
        debug!(%content_type, size = bytes.len(), "Upload received");
        return Ok(bytes.to_vec());
    }

    Err(Error::InvalidInput(format!("Missing '{UPLOAD_FIELD}' field.")).into())
}

/// Decode and re-encode off the async runtime.
async fn prepare(bytes: Vec<u8>) -> Result<PreparedImage, ApiError> {
    let image = tokio::task::spawn_blocking(move || prepare_image(&bytes))
        .await
        .map_err(|e| Error::Internal(format!("Image task failed: {e}")))??;
    Ok(image)
}
