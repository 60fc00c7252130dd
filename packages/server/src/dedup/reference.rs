use common::epoch;
use common::storage::ObjectStorage;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{blob_object, file_reference};

use super::blob::{BlobService, DecrementOutcome};
use super::error::DedupError;
use super::query::{PageRequest, ReferenceFilter, ReferenceSort, SortField, escape_like};

/// The reference table: one row per upload, each pointing at a blob.
///
/// Creating or deleting a row moves the blob's live count on the same
/// connection, so when that connection is a transaction both changes commit
/// or roll back together.
pub struct ReferenceService<'a, C: ConnectionTrait> {
    conn: &'a C,
    blobs: BlobService<'a, C>,
}

impl<'a, C: ConnectionTrait> ReferenceService<'a, C> {
    pub fn new(conn: &'a C, storage: &'a dyn ObjectStorage) -> Self {
        Self {
            conn,
            blobs: BlobService::new(conn, storage),
        }
    }

    pub fn blobs(&self) -> &BlobService<'a, C> {
        &self.blobs
    }

    /// Record an upload of `original_filename` pointing at `blob_id`.
    ///
    /// The count goes up first: if the blob was purged since the caller looked
    /// it up this fails with `BlobNotFound` before any row is written.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        blob_id: Uuid,
        original_filename: &str,
    ) -> Result<file_reference::Model, DedupError> {
        self.blobs.increment_reference(blob_id).await?;

        let model = file_reference::ActiveModel {
            blob_id: Set(blob_id),
            original_filename: Set(original_filename.to_string()),
            uploaded_at_epoch_ms: Set(epoch::now_epoch_ms()),
            ..Default::default()
        };

        Ok(model.insert(self.conn).await?)
    }

    /// Delete a reference row and drop its blob's count.
    #[instrument(skip(self, reference), fields(reference_id = reference.id, blob_id = %reference.blob_id))]
    pub async fn delete(
        &self,
        reference: &file_reference::Model,
    ) -> Result<DecrementOutcome, DedupError> {
        let result = file_reference::Entity::delete_by_id(reference.id)
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(DedupError::ReferenceNotFound(reference.id));
        }

        self.blobs.decrement_reference(reference.blob_id).await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<file_reference::Model>, DbErr> {
        file_reference::Entity::find_by_id(id).one(self.conn).await
    }

    /// A reference together with the blob it points at.
    pub async fn find_with_blob(
        &self,
        id: i32,
    ) -> Result<Option<(file_reference::Model, blob_object::Model)>, DbErr> {
        let row = file_reference::Entity::find_by_id(id)
            .find_also_related(blob_object::Entity)
            .one(self.conn)
            .await?;

        Ok(row.and_then(|(reference, blob)| blob.map(|blob| (reference, blob))))
    }

    /// List references matching `filter`, joined with their blobs.
    ///
    /// Returns the requested page and the total number of matches.
    pub async fn list_ordered(
        &self,
        filter: &ReferenceFilter,
        sort: ReferenceSort,
        page: PageRequest,
    ) -> Result<(Vec<(file_reference::Model, blob_object::Model)>, u64), DbErr> {
        let select = apply_filter(
            file_reference::Entity::find().inner_join(blob_object::Entity),
            filter,
        );

        let total = select.clone().count(self.conn).await?;

        let order = sort.order();
        let select = match sort.field {
            SortField::UploadedAt => {
                select.order_by(file_reference::Column::UploadedAtEpochMs, order.clone())
            }
            SortField::OriginalFilename => {
                select.order_by(file_reference::Column::OriginalFilename, order.clone())
            }
            SortField::Size => select.order_by(blob_object::Column::ByteSize, order.clone()),
        };

        let rows = select
            .order_by(file_reference::Column::Id, order)
            .select_also(blob_object::Entity)
            .offset(Some(page.offset()))
            .limit(Some(page.per_page))
            .all(self.conn)
            .await?;

        let rows = rows
            .into_iter()
            .filter_map(|(reference, blob)| blob.map(|blob| (reference, blob)))
            .collect();

        Ok((rows, total))
    }
}

fn apply_filter(
    mut select: Select<file_reference::Entity>,
    filter: &ReferenceFilter,
) -> Select<file_reference::Entity> {
    if let Some(ref search) = filter.filename_contains {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(
                    file_reference::Column::OriginalFilename,
                )))
                .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }
    if let Some(min) = filter.min_size {
        select = select.filter(blob_object::Column::ByteSize.gte(min));
    }
    if let Some(max) = filter.max_size {
        select = select.filter(blob_object::Column::ByteSize.lte(max));
    }
    if !filter.media_types.is_empty() {
        select = select.filter(blob_object::Column::MediaType.is_in(filter.media_types.clone()));
    }
    if let Some(after) = filter.uploaded_after_ms {
        select = select.filter(file_reference::Column::UploadedAtEpochMs.gte(after));
    }
    if let Some(before) = filter.uploaded_before_ms {
        select = select.filter(file_reference::Column::UploadedAtEpochMs.lte(before));
    }
    select
}
