//! `Store` trait: the persistence capability the bot is built against.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DatabaseError;
use crate::ledger::Entry;

/// Income and expense totals for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub income: i64,
    pub expense: i64,
}

impl Balance {
    pub fn net(&self) -> i64 {
        self.income - self.expense
    }
}

/// Sum of amounts for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: i64,
}

/// A persisted entry with its row metadata.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: i64,
    pub entry: Entry,
    pub created_at: String,
}

/// Backend-agnostic persistence for ledger entries and user profiles.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Entries ─────────────────────────────────────────────────────

    /// Persist a classified entry for `user_id`. Returns the row id.
    async fn record_entry(&self, user_id: &str, entry: &Entry) -> Result<i64, DatabaseError>;

    /// Income and expense totals across all of a user's entries.
    async fn balance(&self, user_id: &str) -> Result<Balance, DatabaseError>;

    /// Per-category totals for entries dated on or after `since`,
    /// largest first.
    async fn category_summary(
        &self,
        user_id: &str,
        since: NaiveDate,
        family_only: bool,
    ) -> Result<Vec<CategoryTotal>, DatabaseError>;

    /// Entries dated on or after `since` (all when `None`), oldest first.
    async fn entries_since(
        &self,
        user_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<StoredEntry>, DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Remember the display name a user last wrote with.
    async fn upsert_user_profile(&self, user_id: &str, user_name: &str)
    -> Result<(), DatabaseError>;

    /// The stored display name, if any.
    async fn user_name(&self, user_id: &str) -> Result<Option<String>, DatabaseError>;
}
