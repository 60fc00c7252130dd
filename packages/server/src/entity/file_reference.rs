use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_reference")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub blob_id: Uuid,
    #[sea_orm(belongs_to, from = "blob_id", to = "id")]
    pub blob: HasOne<super::blob_object::Entity>,

    /// Filename as uploaded. Not unique, not normalized.
    pub original_filename: String,

    /// Milliseconds since 2025-01-01T00:00:00Z.
    pub uploaded_at_epoch_ms: i64,
}

impl ActiveModelBehavior for ActiveModel {}
