use thiserror::Error;

/// Errors that can occur while reading or writing physical objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing is stored at the requested location.
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The provided content hash is invalid.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}
