use chrono::Utc;
use common::storage::{ContentHash, ObjectStorage, PurgeReport, StorageLocation, extension_of};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set, SqlErr,
};
use tokio::io::AsyncRead;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entity::blob_object;

use super::error::DedupError;
use super::lock::LocationLocks;

const INCREMENT_COUNT: &str = "live_reference_count + 1";
const DECREMENT_COUNT: &str = "live_reference_count - 1";

/// Storage location of a blob, recomputed from its digest and extension.
pub fn location_of(blob: &blob_object::Model) -> Result<StorageLocation, DedupError> {
    let hash = ContentHash::from_hex(&blob.digest)?;
    Ok(StorageLocation::with_extension(&hash, &blob.extension))
}

/// Result of dropping one reference from a blob.
#[derive(Debug)]
pub enum DecrementOutcome {
    /// Other references remain; only the count changed.
    StillAlive { remaining: i32 },
    /// The count reached zero and the row was deleted. The bytes are removed
    /// by executing the purge once the surrounding transaction has committed.
    Purged(PendingPurge),
}

/// Physical deletion owed for a blob whose row is already gone.
#[derive(Debug)]
#[must_use = "bytes stay on disk until the purge is executed"]
pub struct PendingPurge {
    blob_id: Uuid,
    digest: ContentHash,
    location: StorageLocation,
}

/// How the physical half of a purge went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeStatus {
    Completed(PurgeReport),
    /// A blob with the same location was created after the row was deleted;
    /// its bytes were left in place.
    Superseded { successor_id: Uuid },
    /// The file could not be removed. The row is gone regardless, so this
    /// leaves an orphan file for an offline sweep.
    Failed(String),
}

impl PendingPurge {
    pub fn blob_id(&self) -> Uuid {
        self.blob_id
    }

    /// Delete the bytes and prune empty shard directories. Never fails the
    /// caller; problems are logged.
    ///
    /// Runs under the location lock. A blob re-created with the same digest
    /// and extension after our commit owns the file now, so it is kept.
    pub async fn execute<C: ConnectionTrait>(
        self,
        conn: &C,
        storage: &dyn ObjectStorage,
        locks: &LocationLocks,
    ) -> PurgeStatus {
        let _guard = locks.lock(&self.location).await;

        match BlobService::new(conn, storage)
            .find_by_digest(&self.digest)
            .await
        {
            Ok(Some(successor))
                if StorageLocation::with_extension(&self.digest, &successor.extension)
                    == self.location =>
            {
                info!(
                    blob_id = %self.blob_id,
                    successor_id = %successor.id,
                    location = %self.location,
                    "Location reused by a newer blob, keeping bytes"
                );
                return PurgeStatus::Superseded {
                    successor_id: successor.id,
                };
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    blob_id = %self.blob_id,
                    error = %e,
                    "Could not check for a newer blob, leaving bytes on disk"
                );
                return PurgeStatus::Failed(e.to_string());
            }
        }

        match storage.purge(&self.location).await {
            Ok(report @ PurgeReport::Removed { pruned_dirs }) => {
                info!(
                    blob_id = %self.blob_id,
                    digest = %self.digest,
                    pruned_dirs,
                    "Purged unreferenced blob"
                );
                PurgeStatus::Completed(report)
            }
            Ok(report @ PurgeReport::AlreadyGone { .. }) => {
                warn!(
                    blob_id = %self.blob_id,
                    location = %self.location,
                    "Blob bytes already missing during purge"
                );
                PurgeStatus::Completed(report)
            }
            Err(e) => {
                error!(
                    blob_id = %self.blob_id,
                    location = %self.location,
                    error = %e,
                    "Failed to delete blob bytes, orphan file left on disk"
                );
                PurgeStatus::Failed(e.to_string())
            }
        }
    }
}

/// The object table: one row per unique digest plus its bytes on disk.
///
/// Works on whatever connection it is given; multi-step callers pass a
/// transaction so the row changes commit together.
pub struct BlobService<'a, C: ConnectionTrait> {
    conn: &'a C,
    storage: &'a dyn ObjectStorage,
}

impl<'a, C: ConnectionTrait> BlobService<'a, C> {
    pub fn new(conn: &'a C, storage: &'a dyn ObjectStorage) -> Self {
        Self { conn, storage }
    }

    pub async fn find_by_digest(
        &self,
        digest: &ContentHash,
    ) -> Result<Option<blob_object::Model>, DbErr> {
        blob_object::Entity::find()
            .filter(blob_object::Column::Digest.eq(digest.to_hex()))
            .one(self.conn)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<blob_object::Model>, DbErr> {
        blob_object::Entity::find_by_id(id).one(self.conn).await
    }

    /// Insert a new blob with zero references and write its bytes.
    ///
    /// The row goes in first so that the unique digest constraint decides
    /// concurrent first uploads before anything touches the disk; the bytes
    /// are written before the caller commits. The caller holds the location
    /// lock until then.
    #[instrument(skip(self, digest, reader), fields(digest = %digest))]
    pub async fn create(
        &self,
        digest: &ContentHash,
        filename: &str,
        media_type: &str,
        byte_size: u64,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<blob_object::Model, DedupError> {
        let location = StorageLocation::for_digest(digest, filename);

        let model = blob_object::ActiveModel {
            id: Set(Uuid::now_v7()),
            digest: Set(digest.to_hex()),
            extension: Set(extension_of(filename)),
            media_type: Set(media_type.to_string()),
            byte_size: Set(byte_size as i64),
            live_reference_count: Set(0),
            created_at: Set(Utc::now()),
        };

        let inserted = match model.insert(self.conn).await {
            Ok(inserted) => inserted,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(DedupError::DuplicateDigest(digest.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = self.storage.put_stream(&location, reader).await?;
        if written != byte_size {
            // The source changed after hashing; what landed on disk does not
            // match the digest in its name.
            if let Err(e) = self.storage.purge(&location).await {
                warn!(%location, error = %e, "Failed to remove mismatched upload");
            }
            return Err(DedupError::HashingFailure(std::io::Error::other(format!(
                "stream yielded {written} bytes on write but {byte_size} while hashing"
            ))));
        }

        info!(blob_id = %inserted.id, %location, byte_size, "Stored new blob");
        Ok(inserted)
    }

    /// Add one live reference in a single `UPDATE`, so concurrent increments
    /// and decrements never lose an update.
    pub async fn increment_reference(&self, blob_id: Uuid) -> Result<(), DedupError> {
        let result = blob_object::Entity::update_many()
            .col_expr(
                blob_object::Column::LiveReferenceCount,
                Expr::cust(INCREMENT_COUNT),
            )
            .filter(blob_object::Column::Id.eq(blob_id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(DedupError::BlobNotFound(blob_id));
        }
        Ok(())
    }

    /// Drop one live reference; at zero, delete the row and hand back the
    /// physical purge to run after commit.
    pub async fn decrement_reference(&self, blob_id: Uuid) -> Result<DecrementOutcome, DedupError> {
        let result = blob_object::Entity::update_many()
            .col_expr(
                blob_object::Column::LiveReferenceCount,
                Expr::cust(DECREMENT_COUNT),
            )
            .filter(blob_object::Column::Id.eq(blob_id))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            error!(%blob_id, "Reference decrement on a blob that does not exist");
            return Err(DedupError::BlobNotFound(blob_id));
        }

        let blob = self
            .find_by_id(blob_id)
            .await?
            .ok_or(DedupError::BlobNotFound(blob_id))?;

        if blob.live_reference_count > 0 {
            return Ok(DecrementOutcome::StillAlive {
                remaining: blob.live_reference_count,
            });
        }

        let digest = ContentHash::from_hex(&blob.digest)?;
        let location = StorageLocation::with_extension(&digest, &blob.extension);
        blob_object::Entity::delete_by_id(blob_id)
            .exec(self.conn)
            .await?;

        Ok(DecrementOutcome::Purged(PendingPurge {
            blob_id,
            digest,
            location,
        }))
    }
}
