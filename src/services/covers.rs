//! Cover image storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::CoversConfig,
    error::{AppError, AppResult},
    i18n::MessageKey,
};

/// Storage backend for book cover images
#[async_trait]
pub trait CoverStore: Send + Sync {
    /// Persist an image and return the URL it is served from
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Remove a previously stored image. Unknown URLs are ignored.
    async fn remove(&self, url: &str) -> AppResult<()>;
}

/// Map a raster image MIME type to a file extension, rejecting anything else.
///
/// Covers are served from the API origin, so scriptable formats such as SVG
/// are refused.
fn image_extension(content_type: &str) -> AppResult<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let subtype = essence
        .strip_prefix("image/")
        .ok_or(AppError::Validation(MessageKey::CoverImageInvalid))?;

    Ok(match subtype {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "png" => "png",
        "gif" => "gif",
        "webp" => "webp",
        "avif" => "avif",
        "bmp" => "bmp",
        _ => return Err(AppError::Validation(MessageKey::CoverImageInvalid)),
    })
}

/// Covers written to a local directory and served by the HTTP router
#[derive(Debug, Clone)]
pub struct LocalCoverStore {
    directory: PathBuf,
    public_url: String,
    max_bytes: usize,
}

impl LocalCoverStore {
    pub fn new(config: &CoversConfig) -> Self {
        Self {
            directory: PathBuf::from(&config.directory),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            max_bytes: config.max_bytes,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name behind a URL produced by [`CoverStore::store`]
    fn file_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url.strip_prefix(&self.public_url)?.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(name)
    }
}

#[async_trait]
impl CoverStore for LocalCoverStore {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let extension = image_extension(content_type)?;
        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation(MessageKey::CoverImageTooLarge));
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create cover directory: {}", e)))?;

        let name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.directory.join(&name), &bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write cover image: {}", e)))?;

        tracing::debug!("Stored cover {} ({} bytes)", name, bytes.len());
        Ok(format!("{}/{}", self.public_url, name))
    }

    async fn remove(&self, url: &str) -> AppResult<()> {
        let Some(name) = self.file_name(url) else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.directory.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(format!("Failed to remove cover image: {}", e))),
        }
    }
}
