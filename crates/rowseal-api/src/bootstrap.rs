//! # Bootstrap
//!
//! Reads the process environment, loads the keyring and registry
//! manifest, connects storage and ensures every registered table exists.
//!
//! | Variable              | Meaning                                  | Default    |
//! |-----------------------|------------------------------------------|------------|
//! | `ROWSEAL_PORT`        | HTTP port                                | `8081`     |
//! | `ROWSEAL_KEYS`        | keyring YAML path                        | required   |
//! | `ROWSEAL_ENTITIES`    | registry manifest YAML path              | no types   |
//! | `DATABASE_URL`        | PostgreSQL URL                           | in-memory  |
//! | `ROWSEAL_ADMIN_TOKEN` | bearer token for admin routes            | open       |
//! | `ROWSEAL_LOG_JSON`    | `1`/`true` for JSON logs                 | text       |

use std::path::PathBuf;
use std::sync::Arc;

use rowseal_crypto::{CipherSuite, KeyringConfig, KeyringError};
use rowseal_mapper::{
    Database, Mapper, MapperError, MemoryDatabase, PgDatabase, RegistryBuilder, RegistryError, RegistryManifest,
    StoreError,
};
use thiserror::Error;

use crate::state::{AppConfig, AppState};

/// Startup failure. Every variant is fatal.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("environment variable {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Settings read from the environment.
#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub keys_path: PathBuf,
    pub entities_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub admin_token: Option<String>,
    pub log_json: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("port", &self.port)
            .field("keys_path", &self.keys_path)
            .field("entities_path", &self.entities_path)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BootstrapError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("ROWSEAL_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| BootstrapError::Env {
                var: "ROWSEAL_PORT",
                reason: format!("{raw:?} is not a port: {e}"),
            })?,
            None => AppConfig::default().port,
        };
        let keys_path = get("ROWSEAL_KEYS").map(PathBuf::from).ok_or_else(|| BootstrapError::Env {
            var: "ROWSEAL_KEYS",
            reason: "must point to a keyring file".into(),
        })?;
        let log_json = get("ROWSEAL_LOG_JSON").is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"));

        Ok(Self {
            port,
            keys_path,
            entities_path: get("ROWSEAL_ENTITIES").map(PathBuf::from),
            database_url: get("DATABASE_URL"),
            admin_token: get("ROWSEAL_ADMIN_TOKEN"),
            log_json,
        })
    }

    /// HTTP configuration.
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            port: self.port,
            auth_token: self.admin_token.clone(),
        }
    }
}

/// Build the application state described by `settings`.
pub async fn bootstrap(settings: &Settings) -> Result<AppState, BootstrapError> {
    let keys = KeyringConfig::from_path(&settings.keys_path)?.build(&CipherSuite::default())?;
    let registry = match &settings.entities_path {
        Some(path) => RegistryManifest::from_path(path)?.build()?,
        None => {
            tracing::warn!("ROWSEAL_ENTITIES not set; no entity types are registered");
            RegistryBuilder::new().build()
        }
    };
    let mapper = Arc::new(Mapper::new(registry, keys)?);

    let db: Arc<dyn Database> = match &settings.database_url {
        Some(url) => {
            let db = PgDatabase::connect(url).await?;
            tracing::info!("connected to PostgreSQL");
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory storage");
            Arc::new(MemoryDatabase::new())
        }
    };
    for descriptor in mapper.registry().list() {
        db.ensure_table(descriptor.table()).await?;
    }

    Ok(AppState::new(settings.app_config(), mapper, db))
}
