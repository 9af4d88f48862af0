//! Metadata seam: the table that records which user owns which photo.

use crate::models::photo::{NewPhoto, PhotoRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backend answered, but reported a failure.
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait::async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Fetch the row whose id equals `id`, if any.
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PhotoRecord>>;

    /// All rows owned by `user_id`, in the store's default order.
    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<PhotoRecord>>;

    async fn insert(&self, photo: NewPhoto) -> RepositoryResult<PhotoRecord>;

    /// Delete the row with `id`. Deleting an absent row is not an error.
    async fn delete_by_id(&self, id: &str) -> RepositoryResult<()>;

    /// Cheap reachability check used by the readiness probe.
    async fn ping(&self) -> RepositoryResult<()>;
}
