//! Journal entry storage.
//!
//! Entries belong to an account and are listed newest-first, with ties
//! broken by insertion order. `account_id` is not validated against the
//! `users` table here — referential integrity is the caller's
//! responsibility. Entries can be updated (full-row replace) but never
//! deleted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A mood/journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Store-assigned identifier.
    pub entry_id: i64,
    /// Owning account. Required, but existence is not checked here.
    pub account_id: i64,
    /// Short mood label from an open tag set ("happy", "sad", ...).
    pub emotion: String,
    /// Free-text body, may be long.
    pub text: String,
    /// Whether the entry is pinned in the UI. Defaults to false.
    pub is_pinned: bool,
    /// Epoch milliseconds, stamped when the insert executed.
    pub created_at: i64,
}

/// Storage for journal entries.
#[derive(Clone)]
pub struct JournalStore {
    db: Database,
}

impl JournalStore {
    /// Create a journal store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add an entry and return its store-assigned id.
    ///
    /// `created_at` is stamped inside the worker closure, i.e. when the
    /// queued operation executes, not when the caller enqueued it.
    #[instrument(skip(self, text))]
    pub async fn add_entry(
        &self,
        account_id: i64,
        emotion: &str,
        text: &str,
    ) -> StoreResult<i64> {
        let emotion = emotion.to_string();
        let text = text.to_string();
        self.db
            .execute(move |conn| {
                let now = Utc::now().timestamp_millis();
                conn.execute(
                    "INSERT INTO journal_entries (account_id, emotion, text, is_pinned, created_at) \
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    rusqlite::params![account_id, emotion, text, now],
                )?;
                let id = conn.last_insert_rowid();
                debug!(entry_id = id, account_id, "journal entry added");
                Ok(id)
            })
            .await
    }

    /// List all entries for `account_id`, newest first.
    ///
    /// Ties on `created_at` preserve insertion order. Returns an empty
    /// vec (not an error) when the account has no entries.
    #[instrument(skip(self))]
    pub async fn list_entries(&self, account_id: i64) -> StoreResult<Vec<JournalEntry>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT entry_id, account_id, emotion, text, is_pinned, created_at \
                     FROM journal_entries WHERE account_id = ?1 \
                     ORDER BY created_at DESC, entry_id ASC",
                )?;
                let entries = stmt
                    .query_map(rusqlite::params![account_id], map_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
    }

    /// Fetch a single entry by id, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get_entry(&self, entry_id: i64) -> StoreResult<Option<JournalEntry>> {
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT entry_id, account_id, emotion, text, is_pinned, created_at \
                     FROM journal_entries WHERE entry_id = ?1",
                    rusqlite::params![entry_id],
                    map_entry,
                );
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Replace an entry wholesale by `entry_id`.
    ///
    /// Returns the matched-row count: 0 means no such entry, which the
    /// caller must surface as not-found rather than silently ignore.
    #[instrument(skip(self, entry), fields(entry_id = entry.entry_id))]
    pub async fn update_entry(&self, entry: &JournalEntry) -> StoreResult<usize> {
        let entry = entry.clone();
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE journal_entries \
                     SET account_id = ?2, emotion = ?3, text = ?4, is_pinned = ?5, created_at = ?6 \
                     WHERE entry_id = ?1",
                    rusqlite::params![
                        entry.entry_id,
                        entry.account_id,
                        entry.emotion,
                        entry.text,
                        entry.is_pinned,
                        entry.created_at
                    ],
                )?;
                debug!(entry_id = entry.entry_id, updated, "journal entry updated");
                Ok(updated)
            })
            .await
    }
}

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        entry_id: row.get(0)?,
        account_id: row.get(1)?,
        emotion: row.get(2)?,
        text: row.get(3)?,
        is_pinned: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationPolicy;

    async fn setup_store() -> JournalStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations(MigrationPolicy::Incremental).await.unwrap();
        JournalStore::new(db)
    }

    #[tokio::test]
    async fn add_and_get_entry() {
        let store = setup_store().await;

        let id = store.add_entry(1, "happy", "sunny day").await.unwrap();
        assert!(id > 0);

        let entry = store.get_entry(id).await.unwrap().unwrap();
        assert_eq!(entry.account_id, 1);
        assert_eq!(entry.emotion, "happy");
        assert_eq!(entry.text, "sunny day");
        assert!(!entry.is_pinned);
        assert!(entry.created_at > 0);
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let store = setup_store().await;
        assert!(store.get_entry(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_account() {
        let store = setup_store().await;
        store.add_entry(1, "happy", "mine").await.unwrap();
        store.add_entry(2, "sad", "theirs").await.unwrap();

        let entries = store.list_entries(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "mine");

        assert!(store.list_entries(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_insertion_tiebreak() {
        let store = setup_store().await;

        // Same-millisecond inserts are likely here; the tie-break keeps
        // insertion order among them either way.
        let a = store.add_entry(1, "happy", "first").await.unwrap();
        let b = store.add_entry(1, "calm", "second").await.unwrap();
        let c = store.add_entry(1, "sad", "third").await.unwrap();

        let entries = store.list_entries(1).await.unwrap();
        assert_eq!(entries.len(), 3);

        // Verify descending createdAt with entry_id ASC on ties.
        for pair in entries.windows(2) {
            assert!(
                pair[0].created_at > pair[1].created_at
                    || (pair[0].created_at == pair[1].created_at
                        && pair[0].entry_id < pair[1].entry_id)
            );
        }
        let ids: Vec<i64> = entries.iter().map(|e| e.entry_id).collect();
        assert!(ids.contains(&a) && ids.contains(&b) && ids.contains(&c));
    }

    #[tokio::test]
    async fn backdated_entry_sorts_by_timestamp() {
        let store = setup_store().await;

        let recent = store.add_entry(1, "happy", "today").await.unwrap();
        let old = store.add_entry(1, "sad", "last week").await.unwrap();

        // Backdate the second entry via the update path.
        let mut entry = store.get_entry(old).await.unwrap().unwrap();
        entry.created_at -= 7 * 24 * 60 * 60 * 1000;
        assert_eq!(store.update_entry(&entry).await.unwrap(), 1);

        let entries = store.list_entries(1).await.unwrap();
        assert_eq!(entries[0].entry_id, recent);
        assert_eq!(entries[1].entry_id, old);
    }

    #[tokio::test]
    async fn update_replaces_the_full_row() {
        let store = setup_store().await;
        let id = store.add_entry(1, "happy", "draft").await.unwrap();

        let mut entry = store.get_entry(id).await.unwrap().unwrap();
        entry.emotion = "grateful".into();
        entry.text = "final".into();
        entry.is_pinned = true;
        assert_eq!(store.update_entry(&entry).await.unwrap(), 1);

        let fetched = store.get_entry(id).await.unwrap().unwrap();
        assert_eq!(fetched, entry);
    }

    #[tokio::test]
    async fn update_nonexistent_returns_zero_count() {
        let store = setup_store().await;

        let ghost = JournalEntry {
            entry_id: 999,
            account_id: 1,
            emotion: "happy".into(),
            text: "nope".into(),
            is_pinned: false,
            created_at: 0,
        };
        assert_eq!(store.update_entry(&ghost).await.unwrap(), 0);
    }
}
