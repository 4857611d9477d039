//! Multipart upload handling.
//!
//! Uploads land in a scratch directory keyed by the client's file name, so a
//! later upload with the same name replaces the earlier file.

use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,

    #[error("No selected file")]
    NoSelectedFile,

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Multipart field the client is expected to send the file in
    pub fn field_name(self) -> &'static str {
        match self {
            MediaKind::Image => "file",
            MediaKind::Audio => "audio",
        }
    }
}

/// A file received from a client and written to scratch storage.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Read the `kind` field out of `multipart` and persist it under `scratch_dir`.
pub async fn receive(
    multipart: &mut Multipart,
    kind: MediaKind,
    scratch_dir: &Path,
) -> Result<UploadedAsset, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if field.name() != Some(kind.field_name()) {
            continue;
        }

        // A part without a filename attribute is a plain form value, not a file.
        let Some(client_name) = field.file_name() else {
            continue;
        };
        let file_name = scratch_file_name(client_name).ok_or(UploadError::NoSelectedFile)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?;

        tokio::fs::create_dir_all(scratch_dir).await?;
        let path = scratch_dir.join(file_name);
        tokio::fs::write(&path, &data).await?;

        debug!(path = %path.display(), bytes = data.len(), ?kind, "Upload stored");
        return Ok(UploadedAsset { path, kind });
    }

    Err(UploadError::NoFilePart)
}

/// Reduce a client supplied name to its final component.
fn scratch_file_name(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    Path::new(name).file_name().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_file_name_strips_directories() {
        assert_eq!(
            scratch_file_name("../../etc/photo.jpg"),
            Some(PathBuf::from("photo.jpg"))
        );
        assert_eq!(scratch_file_name("clip.wav"), Some(PathBuf::from("clip.wav")));
    }

    #[test]
    fn test_scratch_file_name_rejects_empty() {
        assert_eq!(scratch_file_name(""), None);
        assert_eq!(scratch_file_name(".."), None);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(MediaKind::Image.field_name(), "file");
        assert_eq!(MediaKind::Audio.field_name(), "audio");
    }
}
