//! Object storage seam: where photo bytes live.

use bytes::Bytes;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend answered, but reported a failure.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("object `{0}` already exists")]
    AlreadyExists(String),
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A bucketed object store addressed by slash-separated paths.
///
/// Implementations have no concept of ownership and remove whatever path
/// they are given.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `path`. Uploading onto an existing path is rejected.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Public URL under which `path` can be fetched. Pure; performs no I/O.
    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Remove the objects at `paths`. Missing paths are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()>;

    /// Cheap reachability check used by the readiness probe.
    async fn ping(&self, bucket: &str) -> StorageResult<()>;
}
