use sea_orm::sea_query::Expr;
use sea_orm::{
    ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect,
};
use serde::Serialize;

use crate::entity::{blob_object, file_reference};

const TOTAL_SIZE: &str = "CAST(COALESCE(SUM(byte_size), 0) AS BIGINT)";
const TOTAL_SPACE_SAVED: &str =
    "CAST(COALESCE(SUM(byte_size * (live_reference_count - 1)), 0) AS BIGINT)";

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Storage totals across both tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Unique blobs stored.
    pub total_files: u64,
    /// Uploads recorded, duplicates included.
    pub total_references: u64,
    /// Bytes actually on disk.
    pub total_size: u64,
    /// Bytes that duplicate uploads would have taken without dedup.
    pub total_space_saved: u64,
}

/// Human-readable size with two decimals, e.g. `1536` gives `"1.50 KB"`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in &SIZE_UNITS[..SIZE_UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} {}", SIZE_UNITS[SIZE_UNITS.len() - 1])
}

/// Read-only aggregates over the blob and reference tables.
pub struct StatsService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> StatsService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn storage_stats(&self) -> Result<StorageStats, DbErr> {
        let total_files = blob_object::Entity::find().count(self.conn).await?;
        let total_references = file_reference::Entity::find().count(self.conn).await?;

        let (total_size, total_space_saved) = blob_object::Entity::find()
            .select_only()
            .column_as(Expr::cust(TOTAL_SIZE), "total_size")
            .column_as(Expr::cust(TOTAL_SPACE_SAVED), "total_space_saved")
            .into_tuple::<(i64, i64)>()
            .one(self.conn)
            .await?
            .unwrap_or_default();

        Ok(StorageStats {
            total_files,
            total_references,
            total_size: total_size.max(0) as u64,
            total_space_saved: total_space_saved.max(0) as u64,
        })
    }

    /// Sorted media types of blobs that still have at least one reference.
    pub async fn distinct_media_types(&self) -> Result<Vec<String>, DbErr> {
        blob_object::Entity::find()
            .select_only()
            .column(blob_object::Column::MediaType)
            .distinct()
            .inner_join(file_reference::Entity)
            .order_by_asc(blob_object::Column::MediaType)
            .into_tuple::<String>()
            .all(self.conn)
            .await
    }
}
