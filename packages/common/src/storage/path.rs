use std::fmt;
use std::path::{Path, PathBuf};

use super::hash::ContentHash;

/// Top-level directory every object lives under.
pub const UPLOADS_DIR: &str = "uploads";

/// Width in hex characters of each shard directory name.
const SHARD_WIDTH: usize = 4;

/// Number of directories the layout places between the storage root and an
/// object: `uploads`, the first shard and the second shard.
const LAYOUT_DEPTH: usize = 3;

/// Relative location of an object inside the storage root.
///
/// Objects are laid out as
/// `uploads/{hex[0..4]}/{hex[4..8]}/{hex}{extension}` so that no single
/// directory grows past 65536 entries per level. The location is a pure
/// function of the digest and the extension remembered from the first
/// upload, so it never has to be stored on its own.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StorageLocation(String);

impl StorageLocation {
    /// Compute the location for a digest, taking the extension from
    /// `filename`.
    pub fn for_digest(hash: &ContentHash, filename: &str) -> Self {
        Self::with_extension(hash, &extension_of(filename))
    }

    /// Compute the location for a digest and an already-normalized extension
    /// (lower-cased, leading dot included, or empty).
    pub fn with_extension(hash: &ContentHash, extension: &str) -> Self {
        let hex = hash.to_hex();
        Self(format!(
            "{UPLOADS_DIR}/{}/{}/{hex}{extension}",
            &hex[..SHARD_WIDTH],
            &hex[SHARD_WIDTH..SHARD_WIDTH * 2],
        ))
    }

    /// Number of directories between the storage root and the object file.
    /// Bounds the upward walk when pruning empty directories.
    pub fn depth(&self) -> usize {
        LAYOUT_DEPTH
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute path of this location under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, seg| p.join(seg))
    }
}

impl fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageLocation({})", self.0)
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased extension of `filename` including the leading dot, or an
/// empty string when there is none.
///
/// Only the last suffix counts (`archive.tar.GZ` gives `.gz`), and a leading
/// dot alone does not make an extension (`.bashrc` gives nothing).
pub fn extension_of(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = name.trim_start_matches('.');
    match stem.rfind('.') {
        Some(idx) => stem[idx..].to_lowercase(),
        None => String::new(),
    }
}
