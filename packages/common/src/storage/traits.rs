use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::path::StorageLocation;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// What a purge did on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReport {
    /// The object file was deleted.
    Removed { pruned_dirs: usize },
    /// There was no file to delete. Not an error: a previous purge may have
    /// crashed after removing it.
    AlreadyGone { pruned_dirs: usize },
}

/// Physical storage for content-addressed objects.
///
/// Implementations only move bytes; reference counting and the decision to
/// purge live in the object table.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes at `location` and return the number of bytes written.
    async fn put(&self, location: &StorageLocation, data: &[u8]) -> Result<u64, StorageError> {
        let mut reader = Cursor::new(data);
        self.put_stream(location, &mut reader).await
    }

    /// Store everything `reader` yields at `location`.
    ///
    /// Writing the same location twice is harmless: a location is derived from
    /// the content digest, so both writers hold identical bytes.
    async fn put_stream(
        &self,
        location: &StorageLocation,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, StorageError>;

    /// Retrieve all bytes stored at `location`.
    async fn get(&self, location: &StorageLocation) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(location).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, location: &StorageLocation) -> Result<BoxReader, StorageError>;

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError>;

    /// Delete the object at `location`, then remove the directories above it
    /// that became empty.
    async fn purge(&self, location: &StorageLocation) -> Result<PurgeReport, StorageError>;
}
