//! Safe image upload handling.
//!
//! Uploads are accepted only when the claimed extension is in the image
//! allow-list AND the bytes actually sniff as that kind of image — the
//! client-supplied filename is never trusted on its own, and never used
//! for storage. Stored names are random.

use crate::config::UploadConfig;
use crate::error::FrameworkError;
use std::path::PathBuf;
use uuid::Uuid;

/// Accepted image extensions.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["gif", "bmp", "png", "jpg", "jpeg"];

/// A stored upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Randomized storage filename.
    pub file_name: String,
    /// Full path the upload was written to.
    pub path: PathBuf,
    /// Sniffed MIME type.
    pub mime_type: String,
}

/// Validates and stores image uploads under the configured directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    config: UploadConfig,
}

impl ImageStore {
    /// Build a store over the upload configuration.
    #[must_use]
    pub const fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Validate an upload and write it under a randomized name.
    ///
    /// # Errors
    ///
    /// Returns [`FrameworkError::PermissionDenied`] when the extension
    /// is not allow-listed, the bytes do not sniff as an allowed image
    /// type, or the sniffed type contradicts the claimed extension;
    /// oversized uploads are refused the same way.
    pub fn store_image(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredImage, FrameworkError> {
        let extension = claimed_extension(original_name).ok_or_else(|| {
            FrameworkError::PermissionDenied(format!("file type not allowed: {original_name}"))
        })?;

        if bytes.len() > self.config.max_bytes {
            return Err(FrameworkError::PermissionDenied(format!(
                "upload exceeds {} bytes",
                self.config.max_bytes
            )));
        }

        let sniffed = infer::get(bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| {
                FrameworkError::PermissionDenied(format!(
                    "file content is not an image: {original_name}"
                ))
            })?;

        let sniffed_ext = normalize_extension(sniffed.extension());
        if sniffed_ext != extension || !ALLOWED_EXTENSIONS.contains(&sniffed_ext.as_str()) {
            tracing::warn!(
                claimed = %extension,
                sniffed = %sniffed.mime_type(),
                "upload content does not match its extension"
            );
            return Err(FrameworkError::PermissionDenied(format!(
                "file type not allowed: {original_name}"
            )));
        }

        let mime_type: mime::Mime = sniffed.mime_type().parse().map_err(|_| {
            FrameworkError::PermissionDenied(format!("file type not allowed: {original_name}"))
        })?;
        if mime_type.type_() != mime::IMAGE {
            return Err(FrameworkError::PermissionDenied(format!(
                "file type not allowed: {original_name}"
            )));
        }

        let file_name = format!("{}.{extension}", Uuid::new_v4().simple());
        let path = self.config.image_dir.join(&file_name);

        std::fs::create_dir_all(&self.config.image_dir)
            .and_then(|()| std::fs::write(&path, bytes))
            .map_err(|e| FrameworkError::Storage(format!("failed to store upload: {e}")))?;

        tracing::debug!(file = %file_name, mime = %mime_type, "stored upload");
        Ok(StoredImage {
            file_name,
            path,
            mime_type: mime_type.to_string(),
        })
    }
}

fn claimed_extension(name: &str) -> Option<String> {
    let extension = normalize_extension(name.rsplit_once('.')?.1);
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

fn normalize_extension(extension: &str) -> String {
    let extension = extension.to_ascii_lowercase();
    if extension == "jpeg" {
        "jpg".to_string()
    } else {
        extension
    }
}
