//! PhotoService: upload, list and delete photos on top of an
//! [`ObjectStorage`] bucket and a [`PhotoRepository`] table.
//!
//! The service owns no state of its own beyond the injected backends, so it is
//! cheap to clone into every request.

use crate::{
    models::photo::{NewPhoto, PhotoRecord},
    services::{object_storage::ObjectStorage, photo_repository::PhotoRepository},
};
use bytes::Bytes;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const UPLOAD_PREFIX: &str = "uploads";

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Upstream(String),
}

pub type PhotoResult<T> = Result<T, PhotoError>;

/// A file taken from the multipart `file` field.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Steps of a delete, in the only order they may happen.
///
/// A request that fails a step's precondition stops at the previous stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStage {
    Requested,
    Fetched,
    OwnershipVerified,
    StorageRemoved,
    MetadataRemoved,
}

impl fmt::Display for DeleteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeleteStage::Requested => "requested",
            DeleteStage::Fetched => "fetched",
            DeleteStage::OwnershipVerified => "ownership-verified",
            DeleteStage::StorageRemoved => "storage-removed",
            DeleteStage::MetadataRemoved => "metadata-removed",
        };
        f.write_str(name)
    }
}

/// Readiness of both backends, as reported by `/readyz`.
#[derive(Debug)]
pub struct Readiness {
    pub metadata: Result<(), String>,
    pub storage: Result<(), String>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.metadata.is_ok() && self.storage.is_ok()
    }
}

#[derive(Clone)]
pub struct PhotoService {
    storage: Arc<dyn ObjectStorage>,
    repository: Arc<dyn PhotoRepository>,
    bucket: String,
    record_uploads: bool,
}

impl PhotoService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        repository: Arc<dyn PhotoRepository>,
        bucket: impl Into<String>,
        record_uploads: bool,
    ) -> Self {
        Self {
            storage,
            repository,
            bucket: bucket.into(),
            record_uploads,
        }
    }

    /// Store `file` under `uploads/{user_id}/{filename}` and return its public URL.
    ///
    /// `file` is `None` when the request carried no `file` part; that case is
    /// rejected before any backend is touched. When upload recording is on,
    /// a metadata row is inserted after the object is stored.
    pub async fn upload(&self, user_id: &str, file: Option<IncomingFile>) -> PhotoResult<String> {
        let file = file.ok_or_else(|| PhotoError::Validation("No file part".into()))?;
        if file.filename.is_empty() {
            return Err(PhotoError::Validation("No selected file".into()));
        }
        if !is_safe_segment(&file.filename) {
            return Err(PhotoError::Validation("Invalid filename".into()));
        }
        // An absent user id still produces a path, with an empty segment.
        if !user_id.is_empty() && !is_safe_segment(user_id) {
            return Err(PhotoError::Validation("Invalid user_id".into()));
        }

        let file_path = upload_path(user_id, &file.filename);
        let content_type = file
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let size = file.data.len();

        self.storage
            .upload(&self.bucket, &file_path, file.data, content_type)
            .await
            .map_err(|err| {
                error!(bucket = %self.bucket, path = %file_path, "upload failed: {}", err);
                PhotoError::Upstream(err.to_string())
            })?;

        let url = self.storage.public_url(&self.bucket, &file_path);
        info!(path = %file_path, size, "stored photo");

        if self.record_uploads {
            let new_photo = NewPhoto {
                user_id: user_id.to_string(),
                url: url.clone(),
                file_path: file_path.clone(),
            };
            match self.repository.insert(new_photo).await {
                Ok(record) => debug!(photo_id = %record.id, "recorded photo metadata"),
                Err(err) => {
                    warn!(
                        path = %file_path,
                        "object stored but metadata insert failed: {}", err
                    );
                    return Err(PhotoError::Upstream(
                        "Failed to record photo metadata".into(),
                    ));
                }
            }
        }

        Ok(url)
    }

    /// URLs of every photo owned by `user_id`, in store order.
    pub async fn list(&self, user_id: Option<&str>) -> PhotoResult<Vec<String>> {
        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(PhotoError::Validation("user_id is required".into())),
        };

        let rows = self.repository.list_by_user(user_id).await.map_err(|err| {
            error!(user_id, "listing photos failed: {}", err);
            PhotoError::Upstream(err.to_string())
        })?;

        debug!(user_id, count = rows.len(), "listed photos");
        Ok(rows.into_iter().map(|row| row.url).collect())
    }

    /// Delete a photo owned by `user_id`.
    ///
    /// Steps run strictly in [`DeleteStage`] order. Storage is removed before
    /// metadata, so a metadata failure at the last step leaves an orphaned row
    /// pointing at a missing object; that row is not compensated.
    pub async fn delete(&self, photo_id: Option<&str>, user_id: Option<&str>) -> PhotoResult<()> {
        let photo_id = required(photo_id, "photo_id is required")?;
        let user_id = required(user_id, "user_id is required")?;
        let mut stage = DeleteStage::Requested;

        let photo: PhotoRecord = match self.repository.find_by_id(photo_id).await {
            Ok(Some(photo)) => photo,
            Ok(None) => return Err(PhotoError::NotFound("Photo not found".into())),
            Err(err) => {
                error!(photo_id, %stage, "fetching photo failed: {}", err);
                return Err(PhotoError::Upstream(
                    "Failed to fetch photo information".into(),
                ));
            }
        };
        stage = DeleteStage::Fetched;

        if photo.user_id != user_id {
            warn!(photo_id, user_id, %stage, "ownership check failed");
            return Err(PhotoError::Forbidden(
                "Unauthorized to delete this photo".into(),
            ));
        }
        stage = DeleteStage::OwnershipVerified;

        if photo.file_path.is_empty() {
            error!(photo_id, %stage, "photo row has no object path");
            return Err(PhotoError::Upstream(
                "Failed to delete photo from storage".into(),
            ));
        }

        if let Err(err) = self
            .storage
            .remove(&self.bucket, std::slice::from_ref(&photo.file_path))
            .await
        {
            error!(photo_id, path = %photo.file_path, %stage, "storage removal failed: {}", err);
            return Err(PhotoError::Upstream(
                "Failed to delete photo from storage".into(),
            ));
        }
        stage = DeleteStage::StorageRemoved;

        if let Err(err) = self.repository.delete_by_id(photo_id).await {
            warn!(
                photo_id,
                path = %photo.file_path,
                %stage,
                "storage object removed but metadata delete failed, row is orphaned: {}",
                err
            );
            return Err(PhotoError::Upstream(
                "Failed to delete photo reference from database".into(),
            ));
        }
        stage = DeleteStage::MetadataRemoved;

        info!(photo_id, user_id, %stage, "deleted photo");
        Ok(())
    }

    /// Ping both backends concurrently.
    pub async fn readiness(&self) -> Readiness {
        let (metadata, storage) =
            futures::join!(self.repository.ping(), self.storage.ping(&self.bucket));
        Readiness {
            metadata: metadata.map_err(|e| e.to_string()),
            storage: storage.map_err(|e| e.to_string()),
        }
    }
}

/// `uploads/{user_id}/{filename}`.
pub fn upload_path(user_id: &str, filename: &str) -> String {
    format!("{}/{}/{}", UPLOAD_PREFIX, user_id, filename)
}

/// True if `segment` can be used as a single path component.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
}

fn required<'a>(value: Option<&'a str>, message: &str) -> PhotoResult<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PhotoError::Validation(message.to_string())),
    }
}
