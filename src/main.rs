use anyhow::{Context, Result};
use photo_manager::{
    config::{AppConfig, BackendConfig},
    routes::routes::build_router,
    services::{
        local_storage::LocalDiskStorage,
        object_storage::ObjectStorage,
        photo_repository::PhotoRepository,
        photo_service::PhotoService,
        sqlite_repository::{SqlitePhotoRepository, run_migrations},
        supabase::SupabaseClient,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Environment file ---
    let dotenv = dotenvy::dotenv();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-manager with config: {:?}", cfg);

    // --- Initialize backends ---
    let (storage, repository, local_files): (
        Arc<dyn ObjectStorage>,
        Arc<dyn PhotoRepository>,
        Option<LocalDiskStorage>,
    ) = match &cfg.backend {
        BackendConfig::Supabase { url, key } => {
            if migrate {
                anyhow::bail!("--migrate only applies to the local backend");
            }
            let client = Arc::new(
                SupabaseClient::new(url, key.clone(), cfg.photos_table.clone())
                    .context("building Supabase client")?,
            );
            let storage: Arc<dyn ObjectStorage> = client.clone();
            let repository: Arc<dyn PhotoRepository> = client;
            (storage, repository, None)
        }
        BackendConfig::Local {
            storage_dir,
            database_url,
            public_base_url,
        } => {
            if !Path::new(storage_dir).exists() {
                fs::create_dir_all(storage_dir)?;
                tracing::info!("Created storage directory at {}", storage_dir);
            }

            let connect_options = SqliteConnectOptions::from_str(database_url)
                .with_context(|| format!("parsing database URL `{}`", database_url))?
                .create_if_missing(true);
            if let Some(parent) = connect_options.get_filename().parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                    tracing::info!("Created missing directory {:?}", parent);
                }
            }

            let db = Arc::new(
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(connect_options)
                    .await
                    .with_context(|| format!("connecting to {}", database_url))?,
            );
            run_migrations(&db).await?;

            // --- Handle migration mode ---
            if migrate {
                tracing::info!("Database migration complete.");
                return Ok(()); // exit after migration
            }

            let local = LocalDiskStorage::new(storage_dir, public_base_url)
                .context("building local storage")?;
            let storage: Arc<dyn ObjectStorage> = Arc::new(local.clone());
            let repository: Arc<dyn PhotoRepository> = Arc::new(SqlitePhotoRepository::new(db));
            (storage, repository, Some(local))
        }
    };

    let service = PhotoService::new(storage, repository, cfg.bucket.clone(), cfg.record_uploads);
    if !cfg.record_uploads {
        tracing::warn!("Upload recording disabled; uploaded photos will not appear in listings");
    }

    // --- Build router ---
    let app = build_router(service, local_files, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
