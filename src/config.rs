use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PHOTOS_TABLE: &str = "photos";

/// Which pair of backends stores photo bytes and metadata.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Supabase Storage + PostgREST.
    Supabase,
    /// Local disk + SQLite.
    Local,
}

/// Backend-specific settings, already validated.
#[derive(Clone, PartialEq)]
pub enum BackendConfig {
    Supabase {
        url: String,
        key: String,
    },
    Local {
        storage_dir: String,
        database_url: String,
        public_base_url: String,
    },
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::Supabase { url, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("key", &"<redacted>")
                .finish(),
            BackendConfig::Local {
                storage_dir,
                database_url,
                public_base_url,
            } => f
                .debug_struct("Local")
                .field("storage_dir", storage_dir)
                .field("database_url", database_url)
                .field("public_base_url", public_base_url)
                .finish(),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub photos_table: String,
    pub record_uploads: bool,
    pub max_upload_bytes: usize,
    pub backend: BackendConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo upload, listing and deletion API")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_MANAGER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_MANAGER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage + metadata backend (overrides PHOTO_MANAGER_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bucket photos are stored in (overrides PHOTO_MANAGER_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Metadata table name, supabase backend only
    /// (overrides PHOTO_MANAGER_PHOTOS_TABLE)
    #[arg(long)]
    pub photos_table: Option<String>,

    /// Do not insert a metadata row on upload
    #[arg(long)]
    pub no_record_uploads: bool,

    /// Largest accepted upload body (overrides PHOTO_MANAGER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Directory where objects are stored by the local backend
    /// (overrides PHOTO_MANAGER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// SQLite URL for the local backend (overrides PHOTO_MANAGER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Prefix of public URLs handed out by the local backend
    /// (overrides PHOTO_MANAGER_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Apply the SQLite schema and exit (local backend)
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge `args` over variables read through `lookup`, over defaults.
    ///
    /// Fails when the Supabase backend is selected without both
    /// `SUPABASE_URL` and `SUPABASE_KEY`.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .or_else(|| lookup("PHOTO_MANAGER_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "PHOTO_MANAGER_PORT")?.unwrap_or(5000),
        };
        let backend = match args.backend {
            Some(backend) => backend,
            None => match lookup("PHOTO_MANAGER_BACKEND") {
                Some(value) => Backend::from_str(&value, true)
                    .map_err(|err| anyhow::anyhow!(err))
                    .with_context(|| format!("parsing PHOTO_MANAGER_BACKEND value `{}`", value))?,
                None => Backend::Supabase,
            },
        };
        let record_uploads = if args.no_record_uploads {
            false
        } else {
            match lookup("PHOTO_MANAGER_RECORD_UPLOADS") {
                Some(value) => parse_flag(&value).with_context(|| {
                    format!("parsing PHOTO_MANAGER_RECORD_UPLOADS value `{}`", value)
                })?,
                None => true,
            }
        };
        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => parse_var(&lookup, "PHOTO_MANAGER_MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let photos_table = args
            .photos_table
            .or_else(|| lookup("PHOTO_MANAGER_PHOTOS_TABLE"))
            .unwrap_or_else(|| DEFAULT_PHOTOS_TABLE.into());

        let backend = match backend {
            Backend::Supabase => {
                let url = lookup("SUPABASE_URL")
                    .filter(|v| !v.is_empty())
                    .context("SUPABASE_URL must be set for the supabase backend")?;
                let key = lookup("SUPABASE_KEY")
                    .filter(|v| !v.is_empty())
                    .context("SUPABASE_KEY must be set for the supabase backend")?;
                BackendConfig::Supabase { url, key }
            }
            // the SQLite schema is fixed by the bundled migration
            Backend::Local if photos_table != DEFAULT_PHOTOS_TABLE => bail!(
                "photos table `{}` is not supported by the local backend, which always uses `{}`",
                photos_table,
                DEFAULT_PHOTOS_TABLE
            ),
            Backend::Local => BackendConfig::Local {
                storage_dir: args
                    .storage_dir
                    .or_else(|| lookup("PHOTO_MANAGER_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into()),
                database_url: args
                    .database_url
                    .or_else(|| lookup("PHOTO_MANAGER_DATABASE_URL"))
                    .unwrap_or_else(|| "sqlite://./data/meta/photos.db".into()),
                public_base_url: args
                    .public_base_url
                    .or_else(|| lookup("PHOTO_MANAGER_PUBLIC_BASE_URL"))
                    .unwrap_or_else(|| format!("http://{}/files", public_authority(&host, port))),
            },
        };

        Ok(Self {
            host,
            port,
            bucket: args
                .bucket
                .or_else(|| lookup("PHOTO_MANAGER_BUCKET"))
                .unwrap_or_else(|| "profile-photos".into()),
            photos_table,
            record_uploads,
            max_upload_bytes,
            backend,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("parsing {} value `{}`", name, value))
        })
        .transpose()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{}`", other),
    }
}

/// Wildcard bind addresses are not reachable URLs.
fn public_authority(host: &str, port: u16) -> String {
    match host {
        "0.0.0.0" | "::" => format!("localhost:{}", port),
        other => format!("{}:{}", other, port),
    }
}
