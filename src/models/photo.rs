//! Represents a photo's metadata row and the request/response bodies that
//! carry photos over HTTP.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// A metadata row associating a stored object with its owner.
///
/// The row is the source of truth for ownership; the bucket itself has no
/// notion of who uploaded what.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct PhotoRecord {
    /// Server-assigned identifier. PostgREST tables often use integer ids,
    /// which are carried here as their decimal string.
    #[serde(deserialize_with = "id_from_text_or_number")]
    pub id: String,

    /// Owner of the photo.
    pub user_id: String,

    /// Public URL handed back to clients.
    pub url: String,

    /// Object path inside the bucket, e.g. `uploads/u1/a.png`. Empty for
    /// rows from tables that only record `url` and `user_id`.
    #[serde(default)]
    pub file_path: String,

    /// Row creation time, when the store reports one.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row contents for a freshly uploaded photo. The id is assigned by the store.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct NewPhoto {
    pub user_id: String,
    pub url: String,
    pub file_path: String,
}

/// Query string accepted by the upload and list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// JSON body of `POST /delete-photo`.
#[derive(Debug, Default, Deserialize)]
pub struct DeletePhotoRequest {
    #[serde(default, deserialize_with = "optional_id_from_text_or_number")]
    pub photo_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => text,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn id_from_text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_id_from_text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
