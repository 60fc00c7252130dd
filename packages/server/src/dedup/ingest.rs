use common::storage::{ContentHash, StorageLocation};
use sea_orm::TransactionTrait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tracing::{debug, info, instrument};

use crate::entity::{blob_object, file_reference};

use super::blob::BlobService;
use super::error::DedupError;
use super::reference::ReferenceService;
use super::store::DedupStore;

/// Lookup/insert rounds before ingest reports contention.
pub const MAX_INGEST_ATTEMPTS: usize = 5;

/// What one successful ingest produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub reference: file_reference::Model,
    /// The blob after this upload's increment.
    pub blob: blob_object::Model,
    /// Whether this upload stored new bytes.
    pub created_blob: bool,
}

impl DedupStore {
    /// Store an upload, reusing the existing blob when the content is known.
    ///
    /// Every successful call adds exactly one reference and exactly one to some
    /// blob's live count. A concurrent first upload of the same content is
    /// resolved by the unique digest constraint: the loser rolls back and
    /// attaches to the winner's blob.
    #[instrument(skip(self, reader, media_type))]
    pub async fn ingest<R>(
        &self,
        mut reader: R,
        filename: &str,
        media_type: &str,
        size_hint: u64,
    ) -> Result<IngestOutcome, DedupError>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send,
    {
        let limit = self.max_upload_size;
        if size_hint > limit {
            return Err(DedupError::PayloadTooLarge {
                actual: size_hint,
                limit,
            });
        }

        let (digest, byte_size) = ContentHash::compute_stream(&mut reader)
            .await
            .map_err(DedupError::HashingFailure)?;

        if byte_size == 0 {
            return Err(DedupError::EmptyPayload);
        }
        if byte_size > limit {
            return Err(DedupError::PayloadTooLarge {
                actual: byte_size,
                limit,
            });
        }

        let storage = self.storage.as_ref();

        for attempt in 1..=MAX_INGEST_ATTEMPTS {
            let existing = BlobService::new(&self.db, storage)
                .find_by_digest(&digest)
                .await?;

            // A new blob writes its file; hold the location until the row
            // commits so a purge of an older blob there cannot remove it.
            let _location_guard = match existing {
                Some(_) => None,
                None => Some(
                    self.locks
                        .lock(&StorageLocation::for_digest(&digest, filename))
                        .await,
                ),
            };

            let txn = self.db.begin().await?;

            let (blob_id, created_blob) = match existing {
                Some(blob) => (blob.id, false),
                None => {
                    let created = BlobService::new(&txn, storage)
                        .create(&digest, filename, media_type, byte_size, &mut reader)
                        .await;
                    match created {
                        Ok(blob) => (blob.id, true),
                        Err(DedupError::DuplicateDigest(_)) => {
                            txn.rollback().await?;
                            reader
                                .rewind()
                                .await
                                .map_err(DedupError::HashingFailure)?;
                            debug!(%digest, attempt, "Lost first-upload race, reusing existing blob");
                            continue;
                        }
                        Err(e) => {
                            txn.rollback().await?;
                            return Err(e);
                        }
                    }
                }
            };

            let references = ReferenceService::new(&txn, storage);
            let created = references.create(blob_id, filename).await;
            let reference = match created {
                Ok(reference) => reference,
                Err(DedupError::BlobNotFound(_)) if !created_blob => {
                    txn.rollback().await?;
                    debug!(%digest, attempt, "Blob purged before it could be referenced, retrying");
                    continue;
                }
                Err(e) => {
                    txn.rollback().await?;
                    return Err(e);
                }
            };

            let blob = references
                .blobs()
                .find_by_id(blob_id)
                .await?
                .ok_or(DedupError::BlobNotFound(blob_id))?;

            txn.commit().await?;

            info!(
                reference_id = reference.id,
                blob_id = %blob.id,
                %digest,
                created_blob,
                live_references = blob.live_reference_count,
                "Ingested upload"
            );

            return Ok(IngestOutcome {
                reference,
                blob,
                created_blob,
            });
        }

        Err(DedupError::Contention {
            digest: digest.to_hex(),
            attempts: MAX_INGEST_ATTEMPTS,
        })
    }
}
