//! Image uploads for post creation.
//!
//! A create request is a multipart form with `title`, `description` and at
//! most one `image` file. The file is written under the uploads directory as
//! `<unix-millis>-<sanitized name>` and served back under the public prefix.

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const IMAGE_FIELD: &str = "image";

/// Attempts at finding a free name when two uploads land on the same millisecond.
const NAME_ATTEMPTS: i64 = 16;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("only one `image` file may be uploaded")]
    TooManyFiles,

    #[error("`{0}` is not an image")]
    NotAnImage(String),

    #[error("upload exceeds {0} bytes")]
    TooLarge(usize),

    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}

/// An image received in the request body but not yet written to disk.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub original_name: String,
    pub data: Bytes,
}

/// The fields of a post-creation form.
#[derive(Debug, Default)]
pub struct PostForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<PendingImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub file_name: String,
    /// Path recorded on the post, relative to the server root.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str, max_bytes: usize) -> Self {
        let trimmed = public_prefix.trim_matches('/');
        Self {
            dir: dir.into(),
            public_prefix: format!("/{}", trimmed),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn read_form(&self, mut multipart: Multipart) -> Result<PostForm, UploadError> {
        let mut form = PostForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                IMAGE_FIELD => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await?;

                    // Browsers send an empty part when no file was chosen
                    if original_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    if form.image.is_some() {
                        return Err(UploadError::TooManyFiles);
                    }
                    if data.len() > self.max_bytes {
                        return Err(UploadError::TooLarge(self.max_bytes));
                    }
                    if !looks_like_image(&original_name, content_type.as_deref()) {
                        return Err(UploadError::NotAnImage(original_name));
                    }
                    form.image = Some(PendingImage {
                        original_name,
                        data,
                    });
                }
                other => tracing::debug!(field = other, "Ignoring unexpected form field"),
            }
        }

        Ok(form)
    }

    pub async fn save(&self, image: &PendingImage) -> Result<StoredImage, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let now = Utc::now().timestamp_millis();
        let mut attempt = 0;
        let (file_name, mut file) = loop {
            let file_name = stored_name(&image.original_name, now + attempt);
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&file_name))
                .await;
            match opened {
                Ok(file) => break (file_name, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let written = async {
            file.write_all(&image.data).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(self.dir.join(&file_name)).await;
            return Err(e.into());
        }

        tracing::info!(file = %file_name, bytes = image.data.len(), "Stored upload");
        Ok(StoredImage {
            path: format!("{}/{}", self.public_prefix.trim_start_matches('/'), file_name),
            file_name,
        })
    }

    /// Remove a stored upload whose post was never created.
    pub async fn discard(&self, image: &StoredImage) {
        match tokio::fs::remove_file(self.dir.join(&image.file_name)).await {
            Ok(()) => tracing::info!(file = %image.file_name, "Removed orphaned upload"),
            Err(e) => tracing::warn!(file = %image.file_name, "Failed to remove orphaned upload: {}", e),
        }
    }
}

/// `<millis>-<name>`, keeping only the last path component of `original`
/// and replacing anything outside `[A-Za-z0-9._-]`.
pub fn stored_name(original: &str, millis: i64) -> String {
    let base = original.rsplit(&['/', '\\'][..]).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("{}-{}", millis, cleaned)
}

/// Any `image/*` type except SVG, which may embed script.
fn looks_like_image(file_name: &str, content_type: Option<&str>) -> bool {
    let essence = match mime_guess::from_path(file_name).first() {
        Some(guess) => guess.essence_str().to_string(),
        None => match content_type {
            Some(ct) => ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase(),
            None => return false,
        },
    };
    essence.starts_with("image/") && essence != mime_guess::mime::IMAGE_SVG.essence_str()
}
