//! Configuration read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::StreamConfig;
use crate::error::ConfigError;
use crate::store::StoreConfig;

/// Everything the bot needs at startup.
#[derive(Debug)]
pub struct AppConfig {
    pub bot_token: SecretString,
    pub store: StoreConfig,
    pub stream: StreamConfig,
    pub lock_file: PathBuf,
    /// Chat ids allowed to use the bot; `"*"` allows everyone.
    pub allowed_chats: Vec<String>,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_TOKEN")
            .or_else(|| get("TELEGRAM_BOT_TOKEN"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("BOT_TOKEN".to_string()))?;

        let store = StoreConfig::resolve(
            get("DATABASE_URL").as_deref(),
            SecretString::from(get("DATABASE_AUTH_TOKEN").unwrap_or_default()),
            get("DATABASE_PATH").as_deref().unwrap_or("data.db"),
        )?;

        let timeout_secs: u64 = parse_or(&get, "NAMI_POLL_TIMEOUT_SECS", 30)?;
        let initial_ms: u64 = parse_or(&get, "NAMI_BACKOFF_INITIAL_MS", 1000)?;
        let max_secs: u64 = parse_or(&get, "NAMI_BACKOFF_MAX_SECS", 60)?;
        let dedup_horizon: i64 = parse_or(&get, "NAMI_DEDUP_HORIZON", 10_000)?;

        if initial_ms == 0 {
            return Err(invalid("NAMI_BACKOFF_INITIAL_MS", "must be greater than zero"));
        }
        let initial_backoff = Duration::from_millis(initial_ms);
        let max_backoff = Duration::from_secs(max_secs);
        if max_backoff < initial_backoff {
            return Err(invalid(
                "NAMI_BACKOFF_MAX_SECS",
                "must not be shorter than NAMI_BACKOFF_INITIAL_MS",
            ));
        }
        if dedup_horizon < 1 {
            return Err(invalid("NAMI_DEDUP_HORIZON", "must be at least 1"));
        }

        let allowed_chats: Vec<String> = get("NAMI_ALLOWED_CHATS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bot_token,
            store,
            stream: StreamConfig {
                timeout_secs,
                initial_backoff,
                max_backoff,
                dedup_horizon,
            },
            lock_file: get("NAMI_LOCK_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data.bot.lock")),
            allowed_chats,
            log_dir: get("NAMI_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
