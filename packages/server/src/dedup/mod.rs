//! Content-addressed, deduplicating file storage.
//!
//! Uploads become [`file_reference`](crate::entity::file_reference) rows that
//! point at one [`blob_object`](crate::entity::blob_object) per distinct
//! SHA-256 digest. Each blob carries a live reference count; when it drops to
//! zero the row is deleted and the bytes are purged from disk after commit.

mod blob;
mod error;
mod ingest;
mod lock;
mod query;
mod reference;
mod stats;
mod store;

pub use blob::{BlobService, DecrementOutcome, PendingPurge, PurgeStatus, location_of};
pub use error::DedupError;
pub use ingest::{IngestOutcome, MAX_INGEST_ATTEMPTS};
pub use lock::{LocationGuard, LocationLocks};
pub use query::{PageRequest, ReferenceFilter, ReferenceSort, SortField, escape_like};
pub use reference::ReferenceService;
pub use stats::{StatsService, StorageStats, format_size};
pub use store::{DeleteOutcome, DedupStore};

#[cfg(test)]
pub(crate) mod testing;
