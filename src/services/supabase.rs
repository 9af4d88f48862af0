//! SupabaseClient: one `reqwest` client speaking to both the Supabase
//! Storage API (object bytes) and PostgREST (the metadata table).
//!
//! - `POST   /storage/v1/object/{bucket}/{path}`    upload
//! - `DELETE /storage/v1/object/{bucket}`           remove, body `{"prefixes": [...]}`
//! - `GET    /storage/v1/bucket/{bucket}`           ping
//! - `/storage/v1/object/public/{bucket}/{path}`  public URL, built without a request
//! - `GET|POST|DELETE /rest/v1/{table}`             select / insert / delete

use crate::{
    models::photo::{NewPhoto, PhotoRecord},
    services::{
        object_storage::{ObjectStorage, StorageError, StorageResult},
        photo_repository::{PhotoRepository, RepositoryError, RepositoryResult},
    },
};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, Url, header};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    api_key: String,
    table: String,
}

/// Error bodies from Storage (`{statusCode, error, message}`) and PostgREST
/// (`{code, message, details, hint}`) share a `message` field.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Supabase URL `{}` cannot be used as a base URL", base_url);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: api_key.into(),
            table: table.into(),
        })
    }

    /// `base_url` with `segments` appended; each segment is percent-encoded.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `{bucket}/{path}` split into URL segments, keeping empty ones.
    fn object_segments<'a>(bucket: &'a str, path: &'a str) -> impl Iterator<Item = &'a str> {
        std::iter::once(bucket).chain(path.split('/'))
    }

    fn table_url(&self) -> Url {
        self.endpoint(["rest", "v1", self.table.as_str()])
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
    }

    /// Turn a non-2xx response into `(status, message)`.
    async fn ensure_success(response: Response) -> Result<Response, (u16, String)> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });
        Err((status.as_u16(), message))
    }

    async fn check_storage(response: Response) -> StorageResult<Response> {
        Self::ensure_success(response)
            .await
            .map_err(|(status, message)| StorageError::Upstream { status, message })
    }

    async fn check_rest(response: Response) -> RepositoryResult<Response> {
        Self::ensure_success(response)
            .await
            .map_err(|(status, message)| RepositoryError::Upstream { status, message })
    }

    async fn select_eq(&self, column: &str, value: &str) -> RepositoryResult<Vec<PhotoRecord>> {
        let response = self
            .authorized(self.http.get(self.table_url()))
            .query(&[("select", "*".to_string()), (column, format!("eq.{}", value))])
            .send()
            .await?;
        let rows = Self::check_rest(response).await?.json().await?;
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        let url = self.endpoint(
            ["storage", "v1", "object"]
                .into_iter()
                .chain(Self::object_segments(bucket, path)),
        );
        debug!(%url, size = data.len(), "uploading object");

        let response = self
            .authorized(self.http.post(url))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        Self::check_storage(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(
            ["storage", "v1", "object", "public"]
                .into_iter()
                .chain(Self::object_segments(bucket, path)),
        )
        .to_string()
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        let url = self.endpoint(["storage", "v1", "object", bucket]);
        debug!(%url, ?paths, "removing objects");

        let response = self
            .authorized(self.http.delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check_storage(response).await?;
        Ok(())
    }

    async fn ping(&self, bucket: &str) -> StorageResult<()> {
        let url = self.endpoint(["storage", "v1", "bucket", bucket]);
        let response = self.authorized(self.http.get(url)).send().await?;
        Self::check_storage(response).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PhotoRepository for SupabaseClient {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PhotoRecord>> {
        Ok(self.select_eq("id", id).await?.into_iter().next())
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<PhotoRecord>> {
        self.select_eq("user_id", user_id).await
    }

    async fn insert(&self, photo: NewPhoto) -> RepositoryResult<PhotoRecord> {
        let response = self
            .authorized(self.http.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(&[&photo])
            .send()
            .await?;
        let mut rows: Vec<PhotoRecord> = Self::check_rest(response).await?.json().await?;
        rows.pop().ok_or_else(|| RepositoryError::Upstream {
            status: 200,
            message: "insert returned no rows".into(),
        })
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<()> {
        let response = self
            .authorized(self.http.delete(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        Self::check_rest(response).await?;
        Ok(())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        let response = self
            .authorized(self.http.get(self.table_url()))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        Self::check_rest(response).await?;
        Ok(())
    }
}
