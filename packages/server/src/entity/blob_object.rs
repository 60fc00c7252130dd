use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blob_object")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// SHA-256 content hash, lowercase hex. The dedup key.
    #[sea_orm(unique)]
    pub digest: String,

    /// Lower-cased extension of the first upload's filename (may be empty).
    /// Together with `digest` it determines the storage location.
    pub extension: String,

    /// MIME type declared by the first uploader.
    pub media_type: String,

    /// Size of the blob in bytes.
    pub byte_size: i64,

    /// Number of `file_reference` rows pointing here.
    pub live_reference_count: i32,

    #[sea_orm(has_many)]
    pub references: HasMany<super::file_reference::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
