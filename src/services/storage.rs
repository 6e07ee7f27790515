//! # Object Storage
//!
//! Stores uploaded files under keys of the form `uploads/{user_id}/{timestamp}_{name}.{ext}`
//! and hands out public URLs for them.
//!
//! [`LocalStorage`] writes to a directory that the router serves under `/uploads`.
//! Presigned upload URLs point back at `PUT /api/v1/upload/direct` and carry an
//! expiry and a SHA-256 signature over the key, content type and expiry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretSlice};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

/// Prefix every stored key must carry.
pub const KEY_PREFIX: &str = "uploads/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("upload signature is invalid or expired")]
    InvalidSignature,
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to build URL: {0}")]
    Url(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` under `key` and returns its public URL.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, StorageError>;

    /// Removes the object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Returns a URL the client may upload `key` to until `expires_in` elapses.
    fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    /// Checks a signature previously issued by [`ObjectStorage::presign_upload`].
    fn verify_presigned(
        &self,
        key: &str,
        content_type: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), StorageError>;
}

/// Rejects keys that could escape the upload root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let escapes = key.split('/').any(|segment| segment == ".." || segment == ".");
    if !key.starts_with(KEY_PREFIX) || escapes || key.contains('\\') || key.contains("//") {
        warn!(%key, "Rejected object key");
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Signature over the upload grant, hex encoded.
pub fn sign_upload(secret: &[u8], key: &str, content_type: &str, expires: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(format!(":{key}:{content_type}:{expires}").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Filesystem backed storage.
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
    signing_secret: SecretSlice<u8>,
}

impl LocalStorage {
    pub fn new(root: PathBuf, public_base_url: String, signing_secret: SecretSlice<u8>) -> Self {
        info!(root = %root.display(), %public_base_url, "Initializing local object storage");
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signing_secret,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(Path::new(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, StorageError> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        debug!(path = %path.display(), "Object stored");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!("Object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Object already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let expires = OffsetDateTime::now_utc().unix_timestamp() + expires_in.as_secs() as i64;
        let signature = sign_upload(
            self.signing_secret.expose_secret(),
            key,
            content_type,
            expires,
        );

        let expires = expires.to_string();
        let url = Url::parse_with_params(
            &format!("{}/api/v1/upload/direct", self.public_base_url),
            [
                ("key", key),
                ("content_type", content_type),
                ("expires", expires.as_str()),
                ("signature", signature.as_str()),
            ],
        )
        .map_err(|e| StorageError::Url(e.to_string()))?;
        Ok(url.to_string())
    }

    fn verify_presigned(
        &self,
        key: &str,
        content_type: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), StorageError> {
        validate_key(key)?;
        if expires < OffsetDateTime::now_utc().unix_timestamp() {
            debug!("Presigned upload expired");
            return Err(StorageError::InvalidSignature);
        }
        let expected = sign_upload(
            self.signing_secret.expose_secret(),
            key,
            content_type,
            expires,
        );
        if expected != signature {
            warn!(%key, "Presigned upload signature mismatch");
            return Err(StorageError::InvalidSignature);
        }
        Ok(())
    }
}
