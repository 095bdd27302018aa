//! Single-slot login session persistence.
//!
//! The session is one durable slot holding at most one account id — not
//! a per-device session table. It lives in a small JSON file *outside*
//! the relational schema, so it survives a destructive schema
//! recreation. Reads and writes are routed through the storage worker
//! (`Database::submit`), which is the only concurrency control: last
//! writer wins.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// On-disk shape of the session slot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionSlot {
    account_id: Option<i64>,
}

/// Persisted "current user" slot.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    path: PathBuf,
}

impl SessionStore {
    /// Create a session store writing its slot file at `path`.
    pub fn new(db: Database, path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            path: path.into(),
        }
    }

    /// Record `account_id` as the logged-in account.
    #[instrument(skip(self))]
    pub async fn set_logged_in_account(&self, account_id: i64) -> StoreResult<()> {
        let path = self.path.clone();
        self.db
            .submit(move || {
                write_slot(&path, Some(account_id))?;
                debug!(account_id, "session set");
                Ok(())
            })
            .await
    }

    /// Return the logged-in account id, or `None` if nobody is logged in.
    ///
    /// A missing slot file reads as `None`; a corrupt one is an explicit
    /// error, not a silent `None`.
    #[instrument(skip(self))]
    pub async fn get_logged_in_account(&self) -> StoreResult<Option<i64>> {
        let path = self.path.clone();
        self.db.submit(move || read_slot(&path)).await
    }

    /// Clear the slot.
    #[instrument(skip(self))]
    pub async fn clear_session(&self) -> StoreResult<()> {
        let path = self.path.clone();
        self.db
            .submit(move || {
                write_slot(&path, None)?;
                debug!("session cleared");
                Ok(())
            })
            .await
    }
}

/// Atomic write: write to a .tmp file then rename over the slot.
fn write_slot(path: &Path, account_id: Option<i64>) -> StoreResult<()> {
    let json = serde_json::to_string(&SessionSlot { account_id })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn read_slot(path: &Path) -> StoreResult<Option<i64>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let slot: SessionSlot = serde_json::from_str(&json)?;
    Ok(slot.account_id)
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn setup_store(dir: &Path) -> SessionStore {
        let db = Database::open_in_memory().unwrap();
        SessionStore::new(db, dir.join("session.json"))
    }

    #[tokio::test]
    async fn empty_slot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_store(dir.path());

        assert_eq!(store.get_logged_in_account().await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_store(dir.path());

        store.set_logged_in_account(7).await.unwrap();
        assert_eq!(store.get_logged_in_account().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_store(dir.path());

        store.set_logged_in_account(1).await.unwrap();
        store.set_logged_in_account(2).await.unwrap();
        assert_eq!(store.get_logged_in_account().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn clear_session_empties_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_store(dir.path());

        store.set_logged_in_account(7).await.unwrap();
        store.clear_session().await.unwrap();
        assert_eq!(store.get_logged_in_account().await.unwrap(), None);
    }

    #[tokio::test]
    async fn session_survives_simulated_restart() {
        let dir = tempfile::tempdir().unwrap();

        let store = setup_store(dir.path());
        store.set_logged_in_account(7).await.unwrap();
        drop(store);

        // Fresh handle over the same paths, as after a process restart.
        let store = setup_store(dir.path());
        assert_eq!(store.get_logged_in_account().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn corrupt_slot_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = setup_store(dir.path());

        fs::write(dir.path().join("session.json"), "{not json").unwrap();
        let result = store.get_logged_in_account().await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }
}
