//! SqlitePhotoRepository: the `photos` table in a local SQLite database.

use crate::{
    models::photo::{NewPhoto, PhotoRecord},
    services::photo_repository::{PhotoRepository, RepositoryResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone, Debug)]
pub struct SqlitePhotoRepository {
    pub db: Arc<SqlitePool>,
}

impl SqlitePhotoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn run_migrations(db: &SqlitePool) -> sqlx::Result<()> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl PhotoRepository for SqlitePhotoRepository {
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<PhotoRecord>> {
        let row = sqlx::query_as::<_, PhotoRecord>(
            "SELECT id, user_id, url, file_path, created_at FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: &str) -> RepositoryResult<Vec<PhotoRecord>> {
        let rows = sqlx::query_as::<_, PhotoRecord>(
            "SELECT id, user_id, url, file_path, created_at
             FROM photos WHERE user_id = ? ORDER BY rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, photo: NewPhoto) -> RepositoryResult<PhotoRecord> {
        let record = sqlx::query_as::<_, PhotoRecord>(
            "INSERT INTO photos (id, user_id, url, file_path, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, user_id, url, file_path, created_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&photo.user_id)
        .bind(&photo.url)
        .bind(&photo.file_path)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;
        Ok(record)
    }

    async fn delete_by_id(&self, id: &str) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        debug!(id, rows = result.rows_affected(), "deleted photo rows");
        Ok(())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
