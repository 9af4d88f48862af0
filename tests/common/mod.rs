//! In-memory backends and request helpers shared by the API tests.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use photo_manager::{
    models::photo::{NewPhoto, PhotoRecord},
    routes::routes::build_router,
    services::{
        object_storage::{ObjectStorage, StorageError, StorageResult},
        photo_repository::{PhotoRepository, RepositoryError, RepositoryResult},
        photo_service::PhotoService,
    },
};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tower::ServiceExt;

pub const BUCKET: &str = "profile-photos";
pub const BOUNDARY: &str = "X-PHOTO-MANAGER-BOUNDARY";

/// Object storage that keeps bytes in a map and records every call.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<BTreeMap<String, Bytes>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_upload: AtomicBool,
    pub fail_remove: AtomicBool,
    pub fail_ping: AtomicBool,
}

impl MemoryStorage {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn put(&self, path: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from_static(b"seed"));
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("upload {}/{}", bucket, path));
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(StorageError::Upstream {
                status: 409,
                message: "The resource already exists".into(),
            });
        }
        self.objects.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://cdn.test/{}/{}", bucket, path)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("remove {}/{}", bucket, paths.join(",")));
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StorageError::Upstream {
                status: 500,
                message: "storage unavailable".into(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn ping(&self, _bucket: &str) -> StorageResult<()> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(StorageError::Upstream {
                status: 503,
                message: "bucket unreachable".into(),
            });
        }
        Ok(())
    }
}

/// Metadata table held in a vector, with per-operation failure switches.
#[derive(Default)]
pub struct MemoryRepository {
    pub rows: Mutex<Vec<PhotoRecord>>,
    pub next_id: AtomicUsize,
    pub mutations: AtomicUsize,
    pub fail_find: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl MemoryRepository {
    pub fn seed(&self, id: &str, user_id: &str, url: &str, file_path: &str) {
        self.rows.lock().unwrap().push(PhotoRecord {
            id: id.into(),
            user_id: user_id.into(),
            url: url.into(),
            file_path: file_path.into(),
            created_at: None,
        });
    }

    pub fn ids(&self) -> Vec<String> {
        self.rows.lock().unwrap().iter().map(|r| r.id.clone()).collect()
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn upstream(message: &str) -> RepositoryError {
        RepositoryError::Upstream {
            status: 500,
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl PhotoRepository for MemoryRepository {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PhotoRecord>> {
        if self.fail_find.load(Ordering::SeqCst) {
            return Err(Self::upstream("select failed"));
        }
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<PhotoRecord>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::upstream("relation \"photos\" does not exist"));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, photo: NewPhoto) -> RepositoryResult<PhotoRecord> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Self::upstream("insert failed"));
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = PhotoRecord {
            id: format!("gen-{}", id),
            user_id: photo.user_id,
            url: photo.url,
            file_path: photo.file_path,
            created_at: None,
        };
        self.rows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::upstream("delete failed"));
        }
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<MemoryStorage>,
    pub repository: Arc<MemoryRepository>,
}

impl TestApp {
    pub fn new(record_uploads: bool) -> Self {
        let storage = Arc::new(MemoryStorage::default());
        let repository = Arc::new(MemoryRepository::default());
        let service = PhotoService::new(
            storage.clone(),
            repository.clone(),
            BUCKET,
            record_uploads,
        );
        Self {
            router: build_router(service, None, 1024 * 1024),
            storage,
            repository,
        }
    }

    /// Send `request` and decode the JSON body (or `Value::Null` if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }
}

/// One multipart part: `(field name, filename, bytes)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a str);

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: image/png\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/delete-photo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
