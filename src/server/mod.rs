//! HTTP server setup and routing.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::chat::ChatBackend;
use crate::inference::EmotionService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub emotions: Arc<EmotionService>,
    pub chat: Arc<dyn ChatBackend>,
    pub scratch_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(emotions: EmotionService, chat: Arc<dyn ChatBackend>, scratch_dir: PathBuf) -> Self {
        Self {
            emotions: Arc::new(emotions),
            chat,
            scratch_dir: Arc::new(scratch_dir),
        }
    }
}

pub fn create_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(routes::upload_image))
        .route("/analyze-audio", post(routes::analyze_audio))
        .route("/chat", post(routes::chat))
        .route("/generate-response", post(routes::generate_response))
        .route("/analyze-sentiment", post(routes::analyze_sentiment))
        .route("/generate-story", post(routes::generate_story))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/health", get(routes::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
