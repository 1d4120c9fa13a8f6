//! Persistence layer: libSQL-backed storage for ledger entries and profiles.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Balance, CategoryTotal, Store, StoredEntry};

use crate::error::{ConfigError, DatabaseError};

const REMOTE_SCHEMES: [&str; 3] = ["libsql://", "https://", "http://"];

/// Where entries are stored. Chosen once at startup.
#[derive(Debug)]
pub enum StoreConfig {
    /// A local SQLite file.
    Local(PathBuf),
    /// A remote libSQL server.
    Remote { url: String, auth_token: SecretString },
    /// Process-local, lost on exit.
    Memory,
}

impl StoreConfig {
    /// Pick a backend from a connection URL and a fallback file path.
    ///
    /// `libsql://`, `https://` and `http://` URLs are remote; any other
    /// scheme is rejected. Without a URL, a path of `:memory:` is in-memory
    /// and anything else is a local file.
    pub fn resolve(
        url: Option<&str>,
        auth_token: SecretString,
        path: &str,
    ) -> Result<Self, ConfigError> {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url)
                if REMOTE_SCHEMES
                    .iter()
                    .any(|scheme| url.starts_with(scheme)) =>
            {
                Ok(StoreConfig::Remote {
                    url: url.to_string(),
                    auth_token,
                })
            }
            Some(other) => {
                let scheme = other.split_once("://").map_or(other, |(s, _)| s);
                Err(ConfigError::InvalidValue {
                    key: "DATABASE_URL".to_string(),
                    message: format!(
                        "unsupported scheme {scheme:?}; expected one of {}",
                        REMOTE_SCHEMES.join(", ")
                    ),
                })
            }
            None => Ok(Self::local_or_memory(path)),
        }
    }

    fn local_or_memory(path: &str) -> Self {
        if path == ":memory:" {
            StoreConfig::Memory
        } else {
            StoreConfig::Local(PathBuf::from(path))
        }
    }
}

/// Open the configured backend and run migrations.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    let backend = match config {
        StoreConfig::Local(path) => LibSqlBackend::new_local(path).await?,
        StoreConfig::Remote { url, auth_token } => {
            LibSqlBackend::new_remote(url, auth_token).await?
        }
        StoreConfig::Memory => LibSqlBackend::new_memory().await?,
    };
    Ok(Arc::new(backend))
}
