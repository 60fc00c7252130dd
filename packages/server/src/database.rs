use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::{blob_object, file_reference};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Secondary indexes for the listing and filtering queries.
///
/// Failures are logged and skipped; the queries still work without them.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let indexes = [
        // Default listing: ORDER BY uploaded_at_epoch_ms DESC, id DESC
        (
            "idx_file_reference_uploaded_id",
            Index::create()
                .if_not_exists()
                .name("idx_file_reference_uploaded_id")
                .table(file_reference::Entity)
                .col(file_reference::Column::UploadedAtEpochMs)
                .col(file_reference::Column::Id)
                .to_owned(),
        ),
        (
            "idx_file_reference_original_filename",
            Index::create()
                .if_not_exists()
                .name("idx_file_reference_original_filename")
                .table(file_reference::Entity)
                .col(file_reference::Column::OriginalFilename)
                .to_owned(),
        ),
        (
            "idx_file_reference_blob_id",
            Index::create()
                .if_not_exists()
                .name("idx_file_reference_blob_id")
                .table(file_reference::Entity)
                .col(file_reference::Column::BlobId)
                .to_owned(),
        ),
        (
            "idx_blob_object_byte_size",
            Index::create()
                .if_not_exists()
                .name("idx_blob_object_byte_size")
                .table(blob_object::Entity)
                .col(blob_object::Column::ByteSize)
                .to_owned(),
        ),
    ];

    let backend = db.get_database_backend();
    for (name, stmt) in indexes {
        match db.execute_raw(backend.build(&stmt)).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}
