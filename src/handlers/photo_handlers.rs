//! HTTP handlers for uploading, listing and deleting photos.
//! Each handler only adapts the request; the workflow lives in `PhotoService`.

use crate::{
    errors::AppError,
    models::photo::{DeletePhotoRequest, DeleteResponse, UploadResponse, UserQuery},
    services::photo_service::{IncomingFile, PhotoService},
};
use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
};

/// Name of the multipart field carrying the photo.
const FILE_FIELD: &str = "file";

/// `POST /upload?user_id=...` with a multipart `file` part.
///
/// A body that is not multipart at all is treated the same as one without a
/// `file` part.
pub async fn upload_photo(
    State(service): State<PhotoService>,
    query: Result<Query<UserQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let query = user_query(query)?;
    let file = match multipart {
        Ok(multipart) => read_file_field(multipart).await?,
        Err(_) => None,
    };

    let user_id = query.user_id.unwrap_or_default();
    let url = service.upload(&user_id, file).await?;
    Ok(Json(UploadResponse { url }))
}

/// `GET /get-images?user_id=...`, answered with a bare JSON array of URLs.
pub async fn list_photos(
    State(service): State<PhotoService>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<String>>, AppError> {
    let query = user_query(query)?;
    let urls = service.list(query.user_id.as_deref()).await?;
    Ok(Json(urls))
}

/// `POST /delete-photo` with `{"photo_id": ..., "user_id": ...}`.
pub async fn delete_photo(
    State(service): State<PhotoService>,
    payload: Result<Json<DeletePhotoRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    service
        .delete(req.photo_id.as_deref(), req.user_id.as_deref())
        .await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Photo deleted successfully".into(),
    }))
}

fn user_query(query: Result<Query<UserQuery>, QueryRejection>) -> Result<UserQuery, AppError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Find the `file` part and buffer it. Other parts are skipped.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<IncomingFile>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;
        return Ok(Some(IncomingFile {
            filename,
            content_type,
            data,
        }));
    }
    Ok(None)
}
