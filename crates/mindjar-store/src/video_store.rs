//! Read-through cache of remotely sourced video metadata.
//!
//! The `videos` table is the cache: rows are keyed by the externally
//! supplied `video_id` and replaced wholesale on conflict (last writer
//! wins). There is no delete path — an empty table is the only way to
//! say "cache empty", and [`VideoCacheStore::count`] is how the refresh
//! collaborator detects it. The remote fetch itself stays outside this
//! crate; [`VideoCacheStore::populate_if_empty`] just awaits whatever
//! loader the caller supplies.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Cached metadata for one remotely sourced video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCacheItem {
    /// Externally supplied stable identifier (primary key).
    pub video_id: String,
    /// Display title.
    pub title: String,
    /// Integer display rank, ascending.
    pub display_order: i64,
}

impl VideoCacheItem {
    /// YouTube embed URL for the presentation layer.
    pub fn embed_url(&self) -> String {
        format!("https://www.youtube.com/embed/{}", self.video_id)
    }
}

/// Storage for the video metadata cache.
#[derive(Clone)]
pub struct VideoCacheStore {
    db: Database,
}

impl VideoCacheStore {
    /// Create a video cache store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or fully replace the row for `item.video_id`. Idempotent.
    #[instrument(skip(self, item), fields(video_id = %item.video_id))]
    pub async fn upsert(&self, item: VideoCacheItem) -> StoreResult<()> {
        self.db
            .execute(move |conn| {
                upsert_one(conn, &item)?;
                debug!(video_id = %item.video_id, "video cache row upserted");
                Ok(())
            })
            .await
    }

    /// Upsert a batch of items in one transaction.
    ///
    /// Returns how many rows were written.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn upsert_all(&self, items: Vec<VideoCacheItem>) -> StoreResult<usize> {
        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                for item in &items {
                    upsert_one(&tx, item)?;
                }
                tx.commit()?;
                debug!(count = items.len(), "video cache batch upserted");
                Ok(items.len())
            })
            .await
    }

    /// All cached videos, sorted by display rank ascending.
    ///
    /// Equal ranks tie-break by `video_id` for a deterministic order.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> StoreResult<Vec<VideoCacheItem>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT video_id, title, display_order FROM videos \
                     ORDER BY display_order ASC, video_id ASC",
                )?;
                let items = stmt
                    .query_map([], |row| {
                        Ok(VideoCacheItem {
                            video_id: row.get(0)?,
                            title: row.get(1)?,
                            display_order: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
    }

    /// Number of cached rows; 0 exactly when the cache is empty.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT count(*) FROM videos", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }

    /// Fill the cache from `loader` if and only if it is empty.
    ///
    /// The loader is the external remote collaborator; it is only
    /// awaited when `count()` is 0. Returns the number of rows written
    /// (0 when the cache was already warm).
    pub async fn populate_if_empty<F, Fut>(&self, loader: F) -> StoreResult<usize>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<Vec<VideoCacheItem>>>,
    {
        if self.count().await? > 0 {
            debug!("video cache already populated, skipping fetch");
            return Ok(0);
        }
        let items = loader().await?;
        self.upsert_all(items).await
    }
}

fn upsert_one(conn: &rusqlite::Connection, item: &VideoCacheItem) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO videos (video_id, title, display_order) VALUES (?1, ?2, ?3) \
         ON CONFLICT(video_id) DO UPDATE SET \
             title = excluded.title, display_order = excluded.display_order",
        rusqlite::params![item.video_id, item.title, item.display_order],
    )?;
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
