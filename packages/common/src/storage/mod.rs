mod error;
mod hash;
mod path;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use hash::ContentHash;
pub use path::{StorageLocation, extension_of};
pub use traits::{BoxReader, ObjectStorage, PurgeReport};
