use std::{env, path::Path};

use anyhow::{bail, Context};
use reqwest::header::{HeaderValue, ACCEPT};
use tracing::info;

use crate::config::AppConfig;

async fn download_file(url: &str, path: &Path) -> anyhow::Result<()> {
    info!(path = %path.display(), %url, "Downloading model artifact");

    let client = reqwest::Client::new();
    let mut request = client
        .get(url)
        .header(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    if let Ok(token) = env::var("GITHUB_TOKEN") {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to send request to {url}"))?;

    if !response.status().is_success() {
        bail!("Failed to download {}: {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read body from {url}"))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

async fn ensure_file(path: &Path, url: Option<&str>, what: &str) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    match url {
        Some(url) => download_file(url, path).await,
        None => bail!(
            "{what} not found at {} and no download URL configured",
            path.display()
        ),
    }
}

/// Fetch any model artifact that is missing locally and has a URL configured.
pub async fn ensure_files_exist(config: &AppConfig) -> anyhow::Result<()> {
    info!("Checking model artifacts...");
    ensure_file(
        &config.image.model_path,
        config.image.model_url.as_deref(),
        "Image model",
    )
    .await?;
    ensure_file(
        &config.audio.model_path,
        config.audio.model_url.as_deref(),
        "Audio model",
    )
    .await?;
    ensure_file(
        &config.audio.encoder_path,
        config.audio.encoder_url.as_deref(),
        "Label encoder",
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_file_needs_no_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pb");
        std::fs::write(&path, b"graph").unwrap();
        ensure_file(&path, None, "Model").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_without_url_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_file(&dir.path().join("absent.pb"), None, "Image model")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Image model not found"));
    }
}
