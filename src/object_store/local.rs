use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use super::{ByteStream, ObjectStore, ObjectStoreError};

/// Local filesystem object store for development and testing.
///
/// Uploads land in a temporary file that is renamed into place only once the
/// incoming stream ends cleanly, so an aborted upload never becomes visible.
pub struct LocalStore {
    base_path: PathBuf,
}

/// Longest file name common filesystems accept.
const MAX_FILE_NAME: usize = 255;

/// Map a key to one file name. Every reserved byte is percent-encoded,
/// `/` included, so keys never imply directories. A leading `.` is encoded
/// too, so no key lands on a dot entry or a staging file.
fn file_name(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    let mut name = urlencoding::encode(key).into_owned();
    if name.starts_with('.') {
        name.replace_range(..1, "%2E");
    }
    (name.len() <= MAX_FILE_NAME).then_some(name)
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// `None` for keys that cannot be stored as a file.
    fn object_path(&self, key: &str) -> Option<PathBuf> {
        file_name(key).map(|name| self.base_path.join(name))
    }

    fn staging_path(&self) -> PathBuf {
        self.base_path
            .join(format!(".upload-{}", uuid::Uuid::new_v4()))
    }
}

async fn write_stream(path: &Path, data: &mut ByteStream) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = data.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> Result<(), ObjectStoreError> {
        let Some(path) = self.object_path(key) else {
            return Err(ObjectStoreError::Backend(format!(
                "key cannot be stored as a local file: {key:?}"
            )));
        };
        let staging = self.staging_path();

        let stored = match write_stream(&staging, &mut data).await {
            Ok(n) => tokio::fs::rename(&staging, &path).await.map(|()| n),
            Err(e) => Err(e),
        };
        let written = match stored {
            Ok(n) => n,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e.into());
            }
        };
        tracing::debug!(key, bytes = written, "Stored object on local disk");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ByteStream, ObjectStoreError> {
        let Some(path) = self.object_path(key) else {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(ObjectStoreError::NotFound(key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Io(e)
            }
        })?;
        Ok(ReaderStream::new(file).boxed())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        // Nothing can be stored under such a key
        let Some(path) = self.object_path(key) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
