//! LocalDiskStorage: an [`ObjectStorage`] that keeps objects on local disk
//! beneath `base_path/{bucket}/{path}` and publishes them through the
//! `/files/{bucket}/{*path}` route.

use crate::services::object_storage::{ObjectStorage, StorageError, StorageResult};
use bytes::Bytes;
use reqwest::Url;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_PATH_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// URL prefix that public URLs are built from, e.g. `http://host:5000/files`.
    pub public_base_url: Url,
}

impl LocalDiskStorage {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: &str) -> anyhow::Result<Self> {
        let public_base_url = Url::parse(public_base_url.trim_end_matches('/'))?;
        if public_base_url.cannot_be_a_base() {
            anyhow::bail!(
                "public base URL `{}` cannot be used as a base URL",
                public_base_url
            );
        }
        Ok(Self {
            base_path: base_path.into(),
            public_base_url,
        })
    }

    /// Reject paths that could escape the bucket directory.
    ///
    /// Empty segments (`uploads//a.png`) are allowed; `..`, absolute paths,
    /// backslashes and control bytes are not.
    fn ensure_path_safe(path: &str) -> StorageResult<()> {
        let invalid = path.is_empty()
            || path.len() > MAX_OBJECT_PATH_LEN
            || path.starts_with('/')
            || path.split('/').any(|segment| segment == "..")
            || path.bytes().any(|b| b.is_ascii_control() || b == b'\\');
        if invalid {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(())
    }

    fn ensure_bucket_safe(bucket: &str) -> StorageResult<()> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(StorageError::InvalidPath(bucket.to_string()));
        }
        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        let mut full = self.bucket_root(bucket);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }

    /// Open an object for streaming out.
    pub async fn open(&self, bucket: &str, path: &str) -> StorageResult<File> {
        Self::ensure_bucket_safe(bucket)?;
        Self::ensure_path_safe(path)?;
        let file_path = self.object_path(bucket, path);
        File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Io(err)
            }
        })
    }

    /// Recursively remove empty directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalDiskStorage {
    /// Write to a temporary file, fsync, then hard-link it into place.
    ///
    /// The link fails if the target exists, so of two racing uploads to the
    /// same path exactly one wins.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        Self::ensure_bucket_safe(bucket)?;
        Self::ensure_path_safe(path)?;

        let file_path = self.object_path(bucket, path);
        if fs::try_exists(&file_path).await? {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let write_result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        let linked = fs::hard_link(&tmp_path, &file_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        match linked {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.to_string()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        debug!("wrote {} bytes to {}", data.len(), file_path.display());
        Ok(())
    }

    /// Each segment is percent-encoded so the URL routes back to `/files`.
    fn public_url(&self, bucket: &str, path: &str) -> String {
        let mut url = self.public_base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(std::iter::once(bucket).chain(path.split('/')));
        }
        url.to_string()
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        Self::ensure_bucket_safe(bucket)?;
        let bucket_root = self.bucket_root(bucket);

        for path in paths {
            Self::ensure_path_safe(path)?;
            let file_path = self.object_path(bucket, path);
            match fs::remove_file(&file_path).await {
                Ok(_) => debug!("removed physical file {}", file_path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("file {} already missing", file_path.display());
                }
                Err(err) => return Err(StorageError::Io(err)),
            }

            if let Some(parent) = file_path.parent() {
                self.prune_empty_dirs(parent, &bucket_root).await;
            }
        }

        Ok(())
    }

    /// Write, read back and delete a probe file under the bucket directory.
    async fn ping(&self, bucket: &str) -> StorageResult<()> {
        Self::ensure_bucket_safe(bucket)?;
        let root = self.bucket_root(bucket);
        fs::create_dir_all(&root).await?;

        let probe = root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        // best-effort cleanup
        let _ = fs::remove_file(&probe).await;

        if read_back? != b"readyz" {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "file content mismatch",
            )));
        }
        Ok(())
    }
}
