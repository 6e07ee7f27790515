//! # Upload Utilities
//!
//! Validation helpers shared by the upload handlers. Files are accepted by declared
//! MIME type and extension, then the leading bytes are sniffed so an executable
//! renamed to `.png` is still refused.

use std::path::Path;

use image::ImageFormat;
use tracing::trace;
use uuid::Uuid;

use crate::utils::constant::MAX_UPLOAD_SIZE;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
];

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "pdf"];

/// Provides file validation utilities for upload handlers.
pub struct UploadValidator;

impl UploadValidator {
    /// Validates that the declared content type is one we store.
    pub fn validate_content_type(content_type: &str) -> Result<(), String> {
        if !ALLOWED_MIME_TYPES.contains(&content_type) {
            return Err(format!("unsupported file type: {content_type}"));
        }
        Ok(())
    }

    /// Validates the extension of the client supplied file name.
    ///
    /// # Returns
    ///
    /// * `Ok(extension)` - Lower-cased extension without the dot
    /// * `Err(String)` - Extension missing or not allowed
    pub fn validate_extension(file_name: &str) -> Result<String, String> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(format!("unsupported file extension: .{ext}"));
        }
        Ok(ext)
    }

    /// Validates that the file is not empty and fits under [`MAX_UPLOAD_SIZE`].
    pub fn validate_size(data: &[u8]) -> Result<(), &'static str> {
        if data.is_empty() {
            return Err("Empty file not allowed");
        }
        if data.len() > MAX_UPLOAD_SIZE {
            return Err("file size exceeds 10MB limit");
        }
        Ok(())
    }

    /// Checks that the file bytes agree with the declared content type.
    ///
    /// Images are sniffed with [`image::guess_format`], PDFs by their `%PDF` magic.
    pub fn validate_content_matches(content_type: &str, data: &[u8]) -> Result<(), String> {
        if content_type == "application/pdf" {
            return if data.starts_with(b"%PDF") {
                Ok(())
            } else {
                Err("file content is not a PDF document".to_string())
            };
        }

        let detected =
            image::guess_format(data).map_err(|e| format!("Could not detect image format: {e}"))?;

        let matches = matches!(
            (content_type, detected),
            ("image/png", ImageFormat::Png)
                | ("image/jpeg" | "image/jpg", ImageFormat::Jpeg)
                | ("image/gif", ImageFormat::Gif)
                | ("image/webp", ImageFormat::WebP)
        );

        if !matches {
            return Err(format!(
                "file content ({detected:?}) does not match declared type {content_type}"
            ));
        }

        trace!(format = ?detected, "Upload content validated");
        Ok(())
    }
}

/// Builds the storage key for a user's upload: `uploads/{user}/{unix_ts}_{name}.{ext}`.
///
/// The base name keeps ASCII alphanumerics, `-` and `_`; everything else becomes `_`.
pub fn generate_object_key(user_id: Uuid, file_name: &str, timestamp: i64) -> String {
    let path = Path::new(file_name);
    let base = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("file");
    let base: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!(
            "uploads/{user_id}/{timestamp}_{base}.{}",
            ext.to_ascii_lowercase()
        ),
        None => format!("uploads/{user_id}/{timestamp}_{base}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn rejects_unknown_mime_types() {
        assert!(UploadValidator::validate_content_type("image/png").is_ok());
        assert!(UploadValidator::validate_content_type("application/pdf").is_ok());
        assert!(UploadValidator::validate_content_type("text/html").is_err());
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(
            UploadValidator::validate_extension("Lawn.JPG").unwrap(),
            "jpg"
        );
        assert!(UploadValidator::validate_extension("script.sh").is_err());
        assert!(UploadValidator::validate_extension("noext").is_err());
    }

    #[test]
    fn sniffing_catches_mismatched_content() {
        assert!(UploadValidator::validate_content_matches("image/png", PNG_MAGIC).is_ok());
        assert!(UploadValidator::validate_content_matches("image/jpeg", PNG_MAGIC).is_err());
        assert!(UploadValidator::validate_content_matches("application/pdf", b"%PDF-1.7").is_ok());
        assert!(UploadValidator::validate_content_matches("application/pdf", PNG_MAGIC).is_err());
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(UploadValidator::validate_size(&[]).is_err());
        assert!(UploadValidator::validate_size(PNG_MAGIC).is_ok());
    }

    #[test]
    fn object_key_layout() {
        let user = Uuid::nil();
        assert_eq!(
            generate_object_key(user, "my lawn.PNG", 1_700_000_000),
            format!("uploads/{user}/1700000000_my_lawn.png")
        );
    }
}
