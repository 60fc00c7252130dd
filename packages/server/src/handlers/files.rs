use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::dedup::DeleteOutcome;
use crate::entity::{blob_object, file_reference};
use crate::error::{AppError, ErrorBody};
use crate::models::file::{
    FileListQuery, FileListResponse, FileReferenceResponse, FileTypesResponse,
    StorageStatsResponse,
};
use crate::models::shared::Pagination;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_SLACK: usize = 1024 * 1024;

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

pub fn upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let limit = usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_SLACK);
    DefaultBodyLimit::max(limit)
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Stores the `file` multipart field. Content identical to an existing file is \
        not stored again; the new upload gets its own ID and filename but shares the bytes.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "File stored", body = FileReferenceResponse),
        (status = 400, description = "Missing, empty or oversized file (VALIDATION_ERROR, PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.store.max_upload_size();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue; // Ignore unknown fields.
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
        let media_type = field
            .content_type()
            .map(|s| s.to_string())
            .or_else(|| mime_guess::from_path(&filename).first().map(|m| m.to_string()))
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        let spooled = spool_field(field, max_size).await?;
        let result = state
            .store
            .ingest(spooled.file, &filename, &media_type, spooled.size)
            .await;
        // Best effort.
        let _ = tokio::fs::remove_file(&spooled.path).await;
        let outcome = result?;

        return Ok((
            StatusCode::CREATED,
            Json(FileReferenceResponse::from((
                outcome.reference,
                outcome.blob,
            ))),
        ));
    }

    Err(AppError::Validation("No file was provided".into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Files",
    operation_id = "listFiles",
    summary = "List uploaded files",
    description = "Paginated list of uploads. Placeholder values (`null`, `undefined`, empty) \
        for numeric filters are ignored; unknown orderings fall back to `-uploaded_at`.",
    params(FileListQuery),
    responses(
        (status = 200, description = "File list", body = FileListResponse),
        (status = 400, description = "Malformed filter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let filter = query.filter()?;
    let page = query.page_request();

    let (rows, total) = state
        .store
        .list_references(&filter, query.sort(), page)
        .await?;

    Ok(Json(FileListResponse {
        data: rows.into_iter().map(FileReferenceResponse::from).collect(),
        pagination: Pagination {
            page: page.page,
            page_size: page.per_page,
            total,
            total_pages: total.div_ceil(page.per_page),
        },
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get a file's metadata",
    params(("id" = i32, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileReferenceResponse),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FileReferenceResponse>, AppError> {
    let row = state.store.get_reference(id).await?;
    Ok(Json(FileReferenceResponse::from(row)))
}

#[utoipa::path(
    get,
    path = "/{id}/content",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a file",
    description = "Streams the file content. Supports ETag-based caching via If-None-Match.",
    params(("id" = i32, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let (reference, blob) = state.store.get_reference(id).await?;
    build_content_response(&state, &reference, &blob, &headers).await
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Files",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Removes the upload. The stored bytes are deleted once no other upload \
        shares them.",
    params(("id" = i32, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.delete_reference(id).await? {
        DeleteOutcome::StillAlive { blob_id, remaining } => {
            info!(%blob_id, remaining, "File deleted, content still shared");
        }
        DeleteOutcome::Purged { blob_id, status } => {
            info!(%blob_id, ?status, "File deleted with its content");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/storage_stats",
    tag = "Files",
    operation_id = "storageStats",
    summary = "Storage statistics",
    description = "Unique files, uploads, bytes stored and bytes saved by deduplication.",
    responses(
        (status = 200, description = "Storage statistics", body = StorageStatsResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn storage_stats(
    State(state): State<AppState>,
) -> Result<Json<StorageStatsResponse>, AppError> {
    Ok(Json(state.store.stats().await?.into()))
}

#[utoipa::path(
    get,
    path = "/file_types",
    tag = "Files",
    operation_id = "listFileTypes",
    summary = "List file types",
    description = "Sorted distinct MIME types of stored files, for filtering.",
    responses(
        (status = 200, description = "File types", body = FileTypesResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn file_types(
    State(state): State<AppState>,
) -> Result<Json<FileTypesResponse>, AppError> {
    Ok(Json(FileTypesResponse {
        file_types: state.store.media_types().await?,
    }))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Multipart error: {e}"))
    }
}

/// An upload copied to a temp file, rewound and ready to hash.
struct SpooledUpload {
    file: tokio::fs::File,
    path: std::path::PathBuf,
    size: u64,
}

/// Copy a multipart field to a temp file.
///
/// Bytes past `max_size` are counted but not written, so the caller can
/// report the real size of an oversized upload.
async fn spool_field(
    mut field: axum::extract::multipart::Field<'_>,
    max_size: u64,
) -> Result<SpooledUpload, AppError> {
    let path = std::env::temp_dir().join(format!("dedup-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut size: u64 = 0;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size += chunk.len() as u64;
            if size > max_size {
                continue;
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        file.rewind()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file rewind failed: {e}")))?;

        Ok(SpooledUpload {
            file,
            path: path.clone(),
            size,
        })
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&path).await;
    }

    result
}

async fn build_content_response(
    state: &AppState,
    reference: &file_reference::Model,
    blob: &blob_object::Model,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let etag_value = format!("\"{}\"", blob.digest);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let reader = state.store.open_content(blob).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &blob.media_type)
        .header(header::CONTENT_LENGTH, blob.byte_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&reference.original_filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
