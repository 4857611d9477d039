use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emotion_service_rs::{
    chat::GeminiClient,
    config::AppConfig,
    server::{create_router, AppState},
    utils::ensure_files_exist,
    EmotionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::load().context("Failed to load configuration")?;
    ensure_files_exist(&config).await?;

    let emotions = EmotionService::load(&config).context("Failed to load models")?;
    if config.chat.api_key.is_none() {
        tracing::warn!("No language service API key configured; chat routes will fail");
    }
    let chat = Arc::new(GeminiClient::new(&config.chat));

    let state = AppState::new(emotions, chat, config.server.scratch_dir.clone());
    let app = create_router(state, config.server.body_limit_bytes());

    let addr = config
        .server
        .socket_addr()
        .context("Invalid server host/port")?;
    info!(%addr, "Listening");

    axum::Server::try_bind(&addr)
        .context("Failed to bind to address")?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emotion_service_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
