//! Error types for nami-ledger.

use std::path::PathBuf;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Channel-related errors.
///
/// Every fetch-side variant is recoverable: the update stream yields it and
/// keeps polling.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Transport failure on channel {name}: {reason}")]
    Transport { name: String, reason: String },

    #[error("Malformed response on channel {name}: {reason}")]
    MalformedResponse { name: String, reason: String },

    #[error("Channel {name} rejected the request: {description}")]
    Rejected { name: String, description: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Text classification errors, shown to the end user as guidance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("No amount found. Try: \"500 groceries\"")]
    NoAmountFound,

    #[error("Amount {token} is not a positive whole number. Try: \"500 groceries\"")]
    InvalidAmount { token: String },
}

/// Single-instance lock errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Another bot instance is already running (PID {pid}). Stop that process or delete {}",
        path.display()
    )]
    AlreadyRunning { pid: u32, path: PathBuf },

    #[error("IO error on lock file: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
