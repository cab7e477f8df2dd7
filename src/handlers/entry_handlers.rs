//! HTTP handlers for entry operations.
//! Streams file bodies in both directions and delegates storage concerns to
//! `StorageService`.

use crate::{
    errors::AppError,
    handlers::AccountId,
    models::Entry,
    services::storage_service::{EntryPatch, ListEntriesParams, ListEntriesResult, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

/// Query params accepted by the entry listing.
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,
}

/// Body of `PATCH /volumes/{volume}/entries/{*key}`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryReq {
    pub key: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListEntriesResponse {
    pub volume: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: usize,
    pub key_count: usize,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub entries: Vec<Entry>,
    pub common_prefixes: Vec<String>,
}

/// PUT `/volumes/{volume}/entries/{*key}`.
///
/// Streams the request body into a new file entry. A key ending in `/`
/// creates a folder instead and ignores the body.
pub async fn put_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    if key.ends_with('/') {
        let folder = service.create_folder(account_id, &volume, &key).await?;
        return Ok((StatusCode::CREATED, Json(folder)).into_response());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let (entry, info) = service
        .upload_file(account_id, &volume, &key, content_type, stream)
        .await?;

    let mut response = (StatusCode::CREATED, Json(entry)).into_response();
    if let Some(etag) = info.etag.as_deref() {
        set_etag(response.headers_mut(), etag);
    }
    Ok(response)
}

/// Result of a multipart upload.
///
/// Every part commits on its own. When a part fails the upload stops there;
/// the parts stored before it stay stored and are listed in `uploaded`.
#[derive(Debug, Serialize)]
pub struct UploadEntriesResponse {
    pub uploaded: Vec<Entry>,
    pub failed: Option<FailedPart>,
}

#[derive(Debug, Serialize)]
pub struct FailedPart {
    pub key: String,
    pub error: String,
}

/// POST `/volumes/{volume}/upload` - multipart upload.
///
/// An optional `prefix` text field places the following files below that
/// folder. Every part with a file name becomes one entry. A failing part
/// answers with that part's error status and the entries stored so far.
pub async fn upload_entries(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(volume): Path<String>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut prefix = String::new();
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        if field.name() == Some("prefix") {
            let text = field
                .text()
                .await
                .map_err(|err| AppError::bad_request(err.body_text()))?;
            prefix = folder_prefix(&text);
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            debug!("skipping multipart field {:?} without a file name", field.name());
            continue;
        };
        let key = format!("{}{}", prefix, file_name);
        let content_type = field.content_type().map(str::to_string);
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));

        match service
            .upload_file(account_id, &volume, &key, content_type, stream)
            .await
        {
            Ok((entry, _)) => uploaded.push(entry),
            Err(err) => {
                let err = AppError::from(err);
                warn!(
                    "multipart upload to {} stopped at {} after {} parts: {}",
                    volume,
                    key,
                    uploaded.len(),
                    err
                );
                let body = UploadEntriesResponse {
                    uploaded,
                    failed: Some(FailedPart {
                        key,
                        error: err.message,
                    }),
                };
                return Ok((err.status, Json(body)).into_response());
            }
        }
    }

    if uploaded.is_empty() {
        return Err(AppError::bad_request("no file parts in upload"));
    }
    let body = UploadEntriesResponse {
        uploaded,
        failed: None,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET `/volumes/{volume}/entries/{*key}`.
///
/// Files are streamed back; folders answer with their metadata as JSON.
pub async fn get_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    match service.get_entry_body(account_id, &volume, &key).await? {
        (entry, Some(file)) => Ok(stream_body(&entry, file)),
        (folder, None) => Ok(Json(folder).into_response()),
    }
}

/// HEAD `/volumes/{volume}/entries/{*key}` - same headers as GET but no body.
pub async fn head_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let entry = service.get_entry(account_id, &volume, &key).await?;
    let mut response = Response::new(Body::empty());
    set_entry_headers(response.headers_mut(), &entry);
    Ok(response)
}

/// PATCH `/volumes/{volume}/entries/{*key}` - rename/move and/or change visibility.
pub async fn update_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
    Json(req): Json<UpdateEntryReq>,
) -> Result<Json<Entry>, AppError> {
    let patch = EntryPatch {
        key: req.key,
        is_public: req.is_public,
    };
    Ok(Json(service.update_entry(account_id, &volume, &key, patch).await?))
}

/// DELETE `/volumes/{volume}/entries/{*key}` - folders go with their contents.
pub async fn delete_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    service.delete_entry(account_id, &volume, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST `/volumes/{volume}/copy/{*key}`.
pub async fn copy_entry(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path((volume, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let copy = service.copy_entry(account_id, &volume, &key).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// GET `/volumes/{volume}/entries` - supports ?prefix=&delimiter=&max-keys=&continuation-token=
pub async fn list_entries(
    State(service): State<StorageService>,
    AccountId(account_id): AccountId,
    Path(volume): Path<String>,
    Query(q): Query<ListEntriesQuery>,
) -> Result<Json<ListEntriesResponse>, AppError> {
    let max_keys = q.max_keys.unwrap_or(1000).clamp(1, 1000);
    let params = ListEntriesParams {
        prefix: q.prefix.clone(),
        delimiter: q.delimiter.clone(),
        continuation_token: q.continuation_token.as_deref().map(decode_continuation_token),
        max_keys,
    };

    let result = service.list_entries(account_id, &volume, params).await?;
    Ok(Json(list_response(volume, q, max_keys, result)))
}

/// GET `/public/{account_id}/{volume}/{*key}` - read without authentication
/// when the volume or the entry is public.
pub async fn get_public_entry(
    State(service): State<StorageService>,
    Path((account_id, volume, key)): Path<(Uuid, String, String)>,
) -> Result<Response, AppError> {
    let (entry, file) = service.get_public_reader(account_id, &volume, &key).await?;
    Ok(stream_body(&entry, file))
}

fn list_response(
    volume: String,
    q: ListEntriesQuery,
    max_keys: usize,
    result: ListEntriesResult,
) -> ListEntriesResponse {
    ListEntriesResponse {
        volume,
        prefix: q.prefix.unwrap_or_default(),
        delimiter: q.delimiter,
        max_keys,
        key_count: result.key_count,
        is_truncated: result.is_truncated,
        next_continuation_token: result
            .next_continuation_token
            .as_deref()
            .map(encode_continuation_token),
        entries: result.entries,
        common_prefixes: result.common_prefixes,
    }
}

fn stream_body(entry: &Entry, file: File) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    set_entry_headers(response.headers_mut(), entry);
    response
}

fn set_entry_headers(headers: &mut HeaderMap, entry: &Entry) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(entry.entry_type())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(entry.size().max(0)));
    if let Ok(value) = HeaderValue::from_str(&entry.updated_at().to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

fn set_etag(headers: &mut HeaderMap, etag: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        headers.insert(header::ETAG, value);
    }
}

/// Normalize a multipart `prefix` field into a folder key prefix.
fn folder_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

fn encode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD.encode(token)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
