use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use super::stats::format_size;

/// Failures of the dedup core.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error(
        "Maximum file size allowed is {}. Your file is {}",
        readable(.limit),
        readable(.actual)
    )]
    PayloadTooLarge { actual: u64, limit: u64 },

    #[error("Uploaded file is empty")]
    EmptyPayload,

    /// Reading the upload failed before any row was written.
    #[error("Could not calculate file hash: {0}")]
    HashingFailure(#[source] std::io::Error),

    /// A concurrent upload of the same content inserted the blob first.
    /// Recovered inside the ingest pipeline; never reaches callers.
    #[error("blob with digest {0} already exists")]
    DuplicateDigest(String),

    #[error("blob {0} not found")]
    BlobNotFound(Uuid),

    #[error("file reference {0} not found")]
    ReferenceNotFound(i32),

    /// Ingest kept losing races and gave up.
    #[error("gave up after {attempts} attempts to store digest {digest}")]
    Contention { digest: String, attempts: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

fn readable(bytes: &u64) -> String {
    format_size(*bytes)
}
