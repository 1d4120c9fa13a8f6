//! libSQL backend: async `Store` trait implementation.
//!
//! Supports local files, remote libSQL servers and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::ledger::{Entry, EntryKind};
use crate::store::migrations;
use crate::store::traits::{Balance, CategoryTotal, Store, StoredEntry};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Connect to a remote libSQL server (`libsql://`, `https://`).
    pub async fn new_remote(url: &str, auth_token: &SecretString) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.expose_secret().to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to remote libSQL: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(url, "Remote database connected");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a StoredEntry.
///
/// Column order matches ENTRY_COLUMNS:
/// 0:id, 1:type, 2:amount, 3:category, 4:reason, 5:is_family, 6:date,
/// 7:payment_mode, 8:created_at
fn row_to_entry(row: &libsql::Row) -> Result<StoredEntry, DatabaseError> {
    let parse = |e: libsql::Error| DatabaseError::Query(format!("row parse: {e}"));

    let kind_str: String = row.get(1).map_err(parse)?;
    let amount: i64 = row.get(2).map_err(parse)?;
    let date_str: String = row.get(6).map_err(parse)?;
    let mode_str: Option<String> = row.get(7).ok();

    let kind: EntryKind = kind_str.parse().map_err(DatabaseError::Query)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Query(format!("bad date {date_str:?}: {e}")))?;

    Ok(StoredEntry {
        id: row.get(0).map_err(parse)?,
        entry: Entry {
            kind,
            amount: u64::try_from(amount)
                .map_err(|_| DatabaseError::Query(format!("negative amount {amount}")))?,
            category: row.get(3).map_err(parse)?,
            reason: row.get(4).ok(),
            date,
            is_family: row.get::<i64>(5).unwrap_or(0) != 0,
            payment_mode: mode_str.and_then(|m| m.parse().ok()).unwrap_or_default(),
        },
        created_at: row.get(8).unwrap_or_default(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const ENTRY_COLUMNS: &str =
    "id, type, amount, category, reason, is_family, date, payment_mode, created_at";

#[async_trait]
impl Store for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Entries ─────────────────────────────────────────────────────

    async fn record_entry(&self, user_id: &str, entry: &Entry) -> Result<i64, DatabaseError> {
        let amount = i64::try_from(entry.amount)
            .map_err(|_| DatabaseError::Query(format!("amount {} out of range", entry.amount)))?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO transactions
                (user_id, type, amount, category, reason, is_family, date, payment_mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                entry.kind.as_str(),
                amount,
                entry.category.as_str(),
                opt_text(entry.reason.as_deref()),
                i64::from(entry.is_family),
                entry.date_iso(),
                entry.payment_mode.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_entry: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(id, user_id, kind = %entry.kind, amount, "Entry recorded");
        Ok(id)
    }

    async fn balance(&self, user_id: &str) -> Result<Balance, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT type, COALESCE(SUM(amount), 0) FROM transactions
                 WHERE user_id = ?1 GROUP BY type",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("balance: {e}")))?;

        let mut balance = Balance::default();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("balance: {e}")))?
        {
            let kind: String = row.get(0).unwrap_or_default();
            let total: i64 = row.get(1).unwrap_or(0);
            match kind.parse::<EntryKind>() {
                Ok(EntryKind::Income) => balance.income = total,
                Ok(EntryKind::Expense) => balance.expense = total,
                Err(e) => tracing::warn!("Skipping balance row: {e}"),
            }
        }
        Ok(balance)
    }

    async fn category_summary(
        &self,
        user_id: &str,
        since: NaiveDate,
        family_only: bool,
    ) -> Result<Vec<CategoryTotal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT category, SUM(amount) AS total FROM transactions
                 WHERE user_id = ?1 AND date >= ?2 AND (?3 = 0 OR is_family = 1)
                 GROUP BY category
                 ORDER BY total DESC, category ASC",
                params![user_id, iso_date(since), i64::from(family_only)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("category_summary: {e}")))?;

        let mut totals = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("category_summary: {e}")))?
        {
            totals.push(CategoryTotal {
                category: row.get(0).unwrap_or_default(),
                total: row.get(1).unwrap_or(0),
            });
        }
        Ok(totals)
    }

    async fn entries_since(
        &self,
        user_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<StoredEntry>, DatabaseError> {
        let since = since.map(iso_date);
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM transactions
                     WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2)
                     ORDER BY date ASC, id ASC"
                ),
                params![user_id, opt_text(since.as_deref())],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("entries_since: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("entries_since: {e}")))?
        {
            match row_to_entry(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping transaction row: {e}"),
            }
        }
        Ok(entries)
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn upsert_user_profile(
        &self,
        user_id: &str,
        user_name: &str,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO user_profiles (user_id, user_name, updated_at)
                 VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(user_id) DO UPDATE SET
                    user_name = excluded.user_name,
                    updated_at = excluded.updated_at",
                params![user_id, user_name],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_user_profile: {e}")))?;
        Ok(())
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_name FROM user_profiles WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("user_name: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("user_name: {e}"))),
        }
    }
}
