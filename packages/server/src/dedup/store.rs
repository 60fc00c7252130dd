use std::sync::Arc;

use common::storage::{BoxReader, ObjectStorage};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entity::{blob_object, file_reference};

use super::blob::{DecrementOutcome, PurgeStatus, location_of};
use super::error::DedupError;
use super::lock::LocationLocks;
use super::query::{PageRequest, ReferenceFilter, ReferenceSort};
use super::reference::ReferenceService;
use super::stats::{StatsService, StorageStats};

/// Result of deleting a reference, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The blob still has other references.
    StillAlive { blob_id: Uuid, remaining: i32 },
    /// The last reference went away; the blob row is gone and `status` says
    /// how removing the bytes went.
    Purged { blob_id: Uuid, status: PurgeStatus },
}

/// Entry point to the dedup core.
///
/// Owns transaction boundaries: each mutating call begins a transaction,
/// drives the blob and reference services on it and commits. Physical
/// deletes run only after the commit that removed the row.
#[derive(Clone)]
pub struct DedupStore {
    pub(super) db: DatabaseConnection,
    pub(super) storage: Arc<dyn ObjectStorage>,
    pub(super) max_upload_size: u64,
    pub(super) locks: LocationLocks,
}

impl DedupStore {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn ObjectStorage>,
        max_upload_size: u64,
    ) -> Self {
        Self {
            db,
            storage,
            max_upload_size,
            locks: LocationLocks::default(),
        }
    }

    pub fn storage(&self) -> &dyn ObjectStorage {
        self.storage.as_ref()
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    fn references(&self) -> ReferenceService<'_, DatabaseConnection> {
        ReferenceService::new(&self.db, self.storage.as_ref())
    }

    /// Delete one reference; purge its blob if that was the last one.
    ///
    /// Purge I/O problems are logged and reported in the outcome but never
    /// turn into an error: the reference is gone either way.
    #[instrument(skip(self))]
    pub async fn delete_reference(&self, reference_id: i32) -> Result<DeleteOutcome, DedupError> {
        let reference = self
            .references()
            .find_by_id(reference_id)
            .await?
            .ok_or(DedupError::ReferenceNotFound(reference_id))?;

        let txn = self.db.begin().await?;
        let outcome = ReferenceService::new(&txn, self.storage.as_ref())
            .delete(&reference)
            .await?;
        txn.commit().await?;

        match outcome {
            DecrementOutcome::StillAlive { remaining } => {
                info!(
                    reference_id,
                    blob_id = %reference.blob_id,
                    remaining,
                    "Deleted reference"
                );
                Ok(DeleteOutcome::StillAlive {
                    blob_id: reference.blob_id,
                    remaining,
                })
            }
            DecrementOutcome::Purged(purge) => {
                let blob_id = purge.blob_id();
                let status = purge
                    .execute(&self.db, self.storage.as_ref(), &self.locks)
                    .await;
                Ok(DeleteOutcome::Purged { blob_id, status })
            }
        }
    }

    pub async fn get_reference(
        &self,
        reference_id: i32,
    ) -> Result<(file_reference::Model, blob_object::Model), DedupError> {
        self.references()
            .find_with_blob(reference_id)
            .await?
            .ok_or(DedupError::ReferenceNotFound(reference_id))
    }

    pub async fn list_references(
        &self,
        filter: &ReferenceFilter,
        sort: ReferenceSort,
        page: PageRequest,
    ) -> Result<(Vec<(file_reference::Model, blob_object::Model)>, u64), DedupError> {
        Ok(self.references().list_ordered(filter, sort, page).await?)
    }

    /// Stream the bytes of a blob.
    pub async fn open_content(&self, blob: &blob_object::Model) -> Result<BoxReader, DedupError> {
        let location = location_of(blob)?;
        Ok(self.storage.get_stream(&location).await?)
    }

    pub async fn stats(&self) -> Result<StorageStats, DedupError> {
        Ok(StatsService::new(&self.db).storage_stats().await?)
    }

    pub async fn media_types(&self) -> Result<Vec<String>, DedupError> {
        Ok(StatsService::new(&self.db).distinct_media_types().await?)
    }
}
