//! HTTP route handlers.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::AppState;
use crate::chat::{self, SentimentReport};
use crate::error::{AppError, Result};
use crate::inference::{InferenceError, InferenceResult};
use crate::upload::{self, MediaKind, UploadedAsset};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

async fn receive(
    state: &AppState,
    multipart: std::result::Result<Multipart, MultipartRejection>,
    kind: MediaKind,
) -> Result<UploadedAsset> {
    // A body that is not multipart at all cannot carry the file part.
    let mut multipart = multipart.map_err(|_| AppError::MissingFile("No file part"))?;
    Ok(upload::receive(&mut multipart, kind, &state.scratch_dir).await?)
}

/// Run a classification off the async executor.
async fn classify<F>(state: &AppState, f: F) -> Result<InferenceResult>
where
    F: FnOnce(&crate::inference::EmotionService) -> std::result::Result<InferenceResult, InferenceError>
        + Send
        + 'static,
{
    let emotions = state.emotions.clone();
    let result = tokio::task::spawn_blocking(move || f(&emotions))
        .await
        .map_err(|e| AppError::from(InferenceError::Task(e.to_string())))??;
    Ok(result)
}

/// POST /upload
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let asset = receive(&state, multipart, MediaKind::Image).await?;
    let result = classify(&state, move |svc| svc.classify_image(&asset.path)).await?;

    info!(emotion = %result.label, "Predicted emotion");
    // Clients read this misspelled key.
    Ok(Json(json!({ "resopnse": result.label })))
}

/// POST /analyze-audio
pub async fn analyze_audio(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let asset = receive(&state, multipart, MediaKind::Audio).await?;
    let result = classify(&state, move |svc| svc.classify_audio(&asset.path)).await?;

    info!(emotion = %result.label, "Predicted audio emotion");
    Ok(Json(json!({ "response": result.label })))
}

/// Non-empty value of an optional JSON string field.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let text = payload
        .ok()
        .and_then(|Json(req)| required(req.text))
        .ok_or_else(|| AppError::BadRequest("No text input provided".to_string()))?;

    info!(chars = text.len(), "Chat message received");
    let reply = chat::chat_once(state.chat.as_ref(), &text).await?;
    Ok(Json(json!({ "text": reply })))
}

/// POST /generate-response
pub async fn generate_response(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let prompt = payload
        .ok()
        .and_then(|Json(req)| required(req.prompt))
        .ok_or_else(|| AppError::BadRequest("No prompt provided".to_string()))?;

    let content = chat::chat_once(state.chat.as_ref(), &prompt)
        .await
        .map_err(|e| {
            error!(error = %e, "Error with Gemini API");
            AppError::Upstream("Failed to communicate with Gemini API.")
        })?;
    Ok(Json(json!({ "content": content })))
}

/// POST /analyze-sentiment
pub async fn analyze_sentiment(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<SentimentReport>> {
    let prompt = payload
        .ok()
        .and_then(|Json(req)| required(req.prompt))
        .ok_or_else(|| AppError::BadRequest("No prompt provided".to_string()))?;

    let report = chat::analyze_sentiment(state.chat.as_ref(), &prompt).await?;
    info!(score = report.score, sentiment = %report.emotion, "Sentiment analyzed");
    Ok(Json(report))
}

/// POST /generate-story
///
/// Placeholder: the payload never depends on the request.
pub async fn generate_story() -> Json<Value> {
    Json(json!({ "data": { "story": "Generated story text" } }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
