use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::error::StorageError;
use super::path::StorageLocation;
use super::traits::{BoxReader, ObjectStorage, PurgeReport};

/// Rename attempts before giving up when a concurrent purge keeps removing
/// the shard directory we are moving into.
const RENAME_ATTEMPTS: usize = 3;

/// Filesystem-backed object storage.
///
/// Objects are stored at `{root}/{location}`; partially written files live in
/// `{root}/.tmp` until they are renamed into place.
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Create the storage, making sure the root and temp directories exist.
    pub async fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Move a finished temp file to its final path, recreating the parent
    /// directory if a concurrent purge pruned it in between.
    async fn move_into_place(&self, temp_path: &Path, final_path: &Path) -> std::io::Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(parent) = final_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            match fs::rename(temp_path, final_path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && attempt < RENAME_ATTEMPTS => {
                    debug!(path = %final_path.display(), attempt, "Shard directory vanished, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Walk upward from the object's directory removing empty directories.
    ///
    /// Visits at most `max_depth` directories and never touches the root.
    async fn prune_empty_dirs(&self, object_path: &Path, max_depth: usize) -> usize {
        let mut pruned = 0;
        let mut dir = object_path.parent();

        for _ in 0..max_depth {
            let Some(current) = dir else { break };
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            if !matches!(is_empty_dir(current).await, Ok(true)) {
                break;
            }
            if let Err(e) = fs::remove_dir(current).await {
                debug!(path = %current.display(), error = %e, "Stopped pruning directories");
                break;
            }
            pruned += 1;
            dir = current.parent();
        }

        pruned
    }
}

async fn is_empty_dir(path: &Path) -> std::io::Result<bool> {
    let mut entries = fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}

#[async_trait]
impl ObjectStorage for FilesystemStorage {
    async fn put_stream(
        &self,
        location: &StorageLocation,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, StorageError> {
        let temp_path = self.temp_path();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024];
        let mut temp_file = fs::File::create(&temp_path).await?;

        let written: std::io::Result<()> = async {
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                total_bytes += n as u64;
                temp_file.write_all(&buf[..n]).await?;
            }
            temp_file.flush().await?;
            temp_file.sync_all().await
        }
        .await;
        drop(temp_file);

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let final_path = location.resolve(&self.root);
        if fs::try_exists(&final_path).await? {
            let _ = fs::remove_file(&temp_path).await;
            return Ok(total_bytes);
        }

        if let Err(e) = self.move_into_place(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(total_bytes)
    }

    async fn get_stream(&self, location: &StorageLocation) -> Result<BoxReader, StorageError> {
        let path = location.resolve(&self.root);
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        Ok(fs::try_exists(location.resolve(&self.root)).await?)
    }

    async fn purge(&self, location: &StorageLocation) -> Result<PurgeReport, StorageError> {
        let path = location.resolve(&self.root);
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        let pruned_dirs = self.prune_empty_dirs(&path, location.depth()).await;

        Ok(if removed {
            PurgeReport::Removed { pruned_dirs }
        } else {
            PurgeReport::AlreadyGone { pruned_dirs }
        })
    }
}
