//! Serves objects written by `LocalDiskStorage`, so the public URLs it hands
//! out resolve. Only mounted when the local backend is selected.

use crate::{
    errors::AppError,
    services::{local_storage::LocalDiskStorage, object_storage::StorageError},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// `GET /files/{bucket}/{*path}` as a streaming response.
pub async fn get_file(
    State(storage): State<LocalDiskStorage>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let file = storage.open(&bucket, &path).await.map_err(|err| match err {
        StorageError::NotFound(_) => AppError::not_found("Object not found"),
        StorageError::InvalidPath(_) => AppError::bad_request("Invalid object path"),
        other => {
            tracing::error!(%bucket, %path, "opening object failed: {}", other);
            AppError::internal("Failed to read object")
        }
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok(response)
}
