use chrono::{DateTime, Utc};
use common::epoch;
use serde::{Deserialize, Serialize};

use crate::dedup::{
    PageRequest, ReferenceFilter, ReferenceSort, StorageStats, format_size, location_of,
};
use crate::entity::{blob_object, file_reference};
use crate::error::AppError;
use crate::models::shared::{Pagination, parse_optional_number};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 50;

/// Response DTO for a single uploaded file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileReferenceResponse {
    /// File reference ID.
    #[schema(example = 17)]
    pub id: i32,
    /// Upload time. `null` only if the stored timestamp is out of range.
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Location of the stored bytes relative to the storage root.
    #[schema(example = "uploads/2cf2/4dba/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824.txt")]
    pub file: String,
    /// MIME type recorded when the content was first stored.
    #[schema(example = "text/plain")]
    pub file_type: String,
    /// Size in bytes.
    #[schema(example = 5)]
    pub size: i64,
    /// Filename as uploaded.
    #[schema(example = "hello.txt")]
    pub original_filename: String,
    /// SHA-256 of the content, lowercase hex.
    #[schema(example = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")]
    pub content_hash: String,
}

impl From<(file_reference::Model, blob_object::Model)> for FileReferenceResponse {
    fn from((reference, blob): (file_reference::Model, blob_object::Model)) -> Self {
        let file = location_of(&blob)
            .map(|location| location.as_str().to_string())
            .unwrap_or_default();
        Self {
            id: reference.id,
            uploaded_at: epoch::from_epoch_ms(reference.uploaded_at_epoch_ms),
            file,
            file_type: blob.media_type,
            size: blob.byte_size,
            original_filename: reference.original_filename,
            content_hash: blob.digest,
        }
    }
}

/// Response DTO for listing files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub data: Vec<FileReferenceResponse>,
    pub pagination: Pagination,
}

/// Query parameters for listing files.
///
/// Numeric filters are taken as strings so that the placeholder values
/// browsers send for empty inputs can be ignored.
#[derive(Deserialize, Default, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListQuery {
    /// Page number, 1-based. Default 1.
    pub page: Option<u64>,
    /// Items per page. Default 10, max 50.
    pub page_size: Option<u64>,
    /// Case-insensitive substring of the original filename.
    pub filename: Option<String>,
    /// Minimum size in bytes (inclusive).
    pub min_size: Option<String>,
    /// Maximum size in bytes (inclusive).
    pub max_size: Option<String>,
    /// Comma-separated MIME types; a file matches if it has any of them.
    pub file_type: Option<String>,
    /// Uploaded at or after this Unix timestamp in milliseconds.
    pub date_after_epoch: Option<String>,
    /// Uploaded at or before this Unix timestamp in milliseconds.
    pub date_before_epoch: Option<String>,
    /// `uploaded_at`, `original_filename` or `size`, optionally prefixed with
    /// `-` for descending. Default `-uploaded_at`.
    pub ordering: Option<String>,
}

impl FileListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: Ord::max(self.page.unwrap_or(1), 1),
            per_page: self
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Unknown orderings fall back to the default.
    pub fn sort(&self) -> ReferenceSort {
        self.ordering
            .as_deref()
            .and_then(ReferenceSort::parse)
            .unwrap_or_default()
    }

    pub fn filter(&self) -> Result<ReferenceFilter, AppError> {
        let media_types = self
            .file_type
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let uploaded_after_ms =
            upload_time_bound(self.date_after_epoch.as_deref(), "date_after_epoch")?;
        let uploaded_before_ms =
            upload_time_bound(self.date_before_epoch.as_deref(), "date_before_epoch")?;

        Ok(ReferenceFilter {
            filename_contains: self.filename.clone().filter(|f| !f.trim().is_empty()),
            min_size: parse_optional_number(self.min_size.as_deref(), "min_size")?,
            max_size: parse_optional_number(self.max_size.as_deref(), "max_size")?,
            media_types,
            uploaded_after_ms,
            uploaded_before_ms,
        })
    }
}

/// Parse a Unix-millisecond bound into custom-epoch milliseconds. Zero counts
/// as unset.
fn upload_time_bound(raw: Option<&str>, name: &str) -> Result<Option<i64>, AppError> {
    parse_optional_number::<i64>(raw, name)?
        .filter(|&ms| ms != 0)
        .map(|ms| {
            epoch::unix_ms_to_epoch_ms(ms)
                .ok_or_else(|| AppError::Validation(format!("{name} is out of range")))
        })
        .transpose()
}

/// Storage totals with human-readable sizes.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageStatsResponse {
    /// Unique stored objects.
    #[schema(example = 12)]
    pub total_files: u64,
    /// Uploads, duplicates included.
    #[schema(example = 20)]
    pub total_references: u64,
    /// Bytes on disk.
    #[schema(example = 1536)]
    pub total_size: u64,
    /// Bytes not stored thanks to deduplication.
    #[schema(example = 512)]
    pub total_space_saved: u64,
    #[schema(example = "1.50 KB")]
    pub total_size_readable: String,
    #[schema(example = "512.00 B")]
    pub total_space_saved_readable: String,
}

impl From<StorageStats> for StorageStatsResponse {
    fn from(stats: StorageStats) -> Self {
        Self {
            total_files: stats.total_files,
            total_references: stats.total_references,
            total_size: stats.total_size,
            total_space_saved: stats.total_space_saved,
            total_size_readable: format_size(stats.total_size),
            total_space_saved_readable: format_size(stats.total_space_saved),
        }
    }
}

/// Distinct MIME types among stored files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileTypesResponse {
    pub file_types: Vec<String>,
}
