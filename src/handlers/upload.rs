//! # Upload Handlers
//!
//! File uploads for listing photos, completion photos and insurance documents.
//!
//! 1. Files are validated by declared MIME type, extension and size
//! 2. The leading bytes must agree with the declared type
//! 3. Files are stored under `uploads/{user_id}/{timestamp}_{name}.{ext}`
//!
//! Clients may also request a presigned URL and `PUT` the bytes to it directly.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::AppState;
use crate::utils::constant::PRESIGNED_URL_EXPIRY;
use crate::utils::upload::{UploadValidator, generate_object_key};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
    pub size: usize,
    pub mime_type: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PresignedUrlRequest {
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub key: String,
}

/// Query string of a presigned upload URL.
#[derive(Debug, Deserialize)]
pub struct DirectUploadQuery {
    pub key: String,
    pub content_type: String,
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub key: String,
}

fn validate_file(content_type: &str, data: &[u8]) -> AppResult<()> {
    UploadValidator::validate_content_type(content_type).map_err(AppError::Validation)?;
    UploadValidator::validate_size(data).map_err(AppError::BadRequest)?;
    UploadValidator::validate_content_matches(content_type, data).map_err(AppError::Validation)
}

/// Uploads a single file.
///
/// POST /api/v1/upload/image MultipartForm
///
/// Accepts a `file` part and an optional `category` text part.
///
/// # Returns
///
/// - `201 Created` with [`UploadResponse`]
/// - `400 Bad Request` - Missing file, unsupported type, empty or oversized file,
///   or content that does not match the declared type
/// - `413 Payload Too Large` - Body over the upload limit (handled by Axum)
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let mut file = None;
    let mut category = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!(error = %e, "Error reading multipart form");
        AppError::BadRequest("invalid multipart data")
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    error!(error = %e, "Error reading file data");
                    AppError::BadRequest("error reading file")
                })?;
                file = Some((file_name, content_type, data));
            }
            "category" => {
                let text = field.text().await.map_err(|e| {
                    warn!(error = %e, "Error reading category field");
                    AppError::BadRequest("error reading category")
                })?;
                category = Some(text.trim().to_string()).filter(|c| !c.is_empty());
            }
            _ => {
                warn!(%field_name, "Unknown field in multipart form");
            }
        }
    }

    let Some((file_name, content_type, data)) = file else {
        warn!("No file provided in multipart form");
        return Err(AppError::BadRequest("no file provided"));
    };

    UploadValidator::validate_extension(&file_name).map_err(AppError::Validation)?;
    validate_file(&content_type, &data)?;

    let key = generate_object_key(
        user.user_id,
        &file_name,
        OffsetDateTime::now_utc().unix_timestamp(),
    );
    let url = state
        .services
        .storage
        .put(&key, &data, &content_type)
        .await?;

    info!(%key, size = data.len(), "File uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            key,
            size: data.len(),
            mime_type: content_type,
            category,
        }),
    ))
}

/// Issues a presigned URL the client can `PUT` the file to for one hour.
///
/// POST /api/v1/upload/presigned-url
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn presigned_upload_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    UploadValidator::validate_content_type(&payload.mime_type).map_err(AppError::Validation)?;
    UploadValidator::validate_extension(&payload.file_name).map_err(AppError::Validation)?;

    let key = generate_object_key(
        user.user_id,
        &payload.file_name,
        OffsetDateTime::now_utc().unix_timestamp(),
    );
    let upload_url =
        state
            .services
            .storage
            .presign_upload(&key, &payload.mime_type, PRESIGNED_URL_EXPIRY)?;

    debug!(%key, "Presigned upload URL issued");
    Ok(Json(PresignedUrlResponse { upload_url, key }))
}

/// Receives the bytes for a presigned upload. The signature is the credential.
///
/// PUT /api/v1/upload/direct ?key&content_type&expires&signature
///
/// # Returns
///
/// - `201 Created` with the stored file's URL and key
/// - `403 Forbidden` - Signature invalid or expired
#[instrument(skip_all, fields(key = %query.key, request_id = %uuid::Uuid::new_v4()))]
pub async fn direct_upload(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DirectUploadQuery>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    state.services.storage.verify_presigned(
        &query.key,
        &query.content_type,
        query.expires,
        &query.signature,
    )?;
    validate_file(&query.content_type, &body)?;

    let url = state
        .services
        .storage
        .put(&query.key, &body, &query.content_type)
        .await?;

    info!(size = body.len(), "Presigned upload stored");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "url": url, "key": query.key })),
    ))
}

/// Deletes one of the caller's own files.
///
/// DELETE /api/v1/upload/file
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DeleteFileRequest>,
) -> AppResult<impl IntoResponse> {
    let own_prefix = format!("uploads/{}/", user.user_id);
    if !payload.key.starts_with(&own_prefix) {
        warn!(key = %payload.key, "Attempt to delete another user's file");
        return Err(AppError::Forbidden("you can only delete your own files"));
    }

    state.services.storage.delete(&payload.key).await?;
    info!(key = %payload.key, "File deleted");
    Ok(Json(json!({ "message": "file deleted successfully" })))
}
