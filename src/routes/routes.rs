//! Defines routes for the photo endpoints.
//!
//! ## Structure
//! - **Photo endpoints**
//!   - `POST /upload?user_id=`      upload a multipart `file`
//!   - `GET  /get-images?user_id=`  list a user's photo URLs
//!   - `POST /delete-photo`         delete a photo after an ownership check
//!
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`
//!
//! - **Local files** (local backend only)
//!   - `GET  /files/{bucket}/{*path}`

use crate::{
    handlers::{
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        photo_handlers::{delete_photo, list_photos, upload_photo},
    },
    services::{local_storage::LocalDiskStorage, photo_service::PhotoService},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Photo and probe routes, carrying `PhotoService` as shared state.
///
/// `max_upload_bytes` replaces axum's default body limit on the upload route.
pub fn routes(max_upload_bytes: usize) -> Router<PhotoService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_photo).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/get-images", get(list_photos))
        .route("/delete-photo", post(delete_photo))
}

/// Routes that stream objects straight from `LocalDiskStorage`.
pub fn file_routes() -> Router<LocalDiskStorage> {
    Router::new().route("/files/{bucket}/{*path}", get(get_file))
}

/// Assemble the full application router with all state applied.
pub fn build_router(
    service: PhotoService,
    local_files: Option<LocalDiskStorage>,
    max_upload_bytes: usize,
) -> Router {
    let app = routes(max_upload_bytes).with_state(service);
    match local_files {
        Some(storage) => app.merge(file_routes().with_state(storage)),
        None => app,
    }
}
