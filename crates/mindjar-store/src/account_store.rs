//! Account storage.
//!
//! Minimal CRUD surface over the `users` table: insert, lookup by email,
//! and an existence probe. Accounts are immutable once created — there
//! is no update or delete path.
//!
//! The `email` column carries `UNIQUE COLLATE NOCASE`, so uniqueness is
//! enforced case-insensitively by SQLite itself. [`AccountStore::insert`]
//! surfaces that constraint failure as a raw sqlite error; translating
//! it into a duplicate-email outcome is the credential service's job
//! (see [`crate::auth::CredentialService`]).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// A stored user account.
///
/// `password_hash` is an opaque string embedding algorithm, cost, salt,
/// and digest — see [`crate::auth`] for the format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned identifier, stable and never reused.
    pub id: i64,
    /// Free-text display name.
    pub full_name: String,
    /// Unique (case-insensitive) email address.
    pub email: String,
    /// Opaque password hash string.
    pub password_hash: String,
    /// Epoch milliseconds, stamped when the insert executed.
    pub created_at: i64,
}

/// Fields for a not-yet-inserted account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Storage for user accounts.
#[derive(Clone)]
pub struct AccountStore {
    db: Database,
}

impl AccountStore {
    /// Create a new account store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new account and return its store-assigned id.
    ///
    /// `created_at` is stamped when the insert executes on the storage
    /// worker. A duplicate email fails with the raw constraint error
    /// from SQLite — callers wanting a typed duplicate outcome should go
    /// through the credential service instead.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn insert(&self, account: NewAccount) -> StoreResult<i64> {
        self.db
            .execute(move |conn| {
                let now = Utc::now().timestamp_millis();
                conn.execute(
                    "INSERT INTO users (full_name, email, password_hash, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        account.full_name,
                        account.email,
                        account.password_hash,
                        now
                    ],
                )?;
                let id = conn.last_insert_rowid();
                debug!(account_id = id, "account created");
                Ok(id)
            })
            .await
    }

    /// Fetch an account by email, returning `None` if not found.
    ///
    /// Matching is case-insensitive (column collation).
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT id, full_name, email, password_hash, created_at \
                     FROM users WHERE email = ?1",
                    rusqlite::params![email],
                    |row| {
                        Ok(Account {
                            id: row.get(0)?,
                            full_name: row.get(1)?,
                            email: row.get(2)?,
                            password_hash: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    },
                );
                match result {
                    Ok(account) => Ok(Some(account)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Count accounts with this email (0 or 1 given the uniqueness
    /// constraint). Existence probe only — the constraint remains the
    /// source of truth for uniqueness.
    #[instrument(skip(self))]
    pub async fn count_by_email(&self, email: &str) -> StoreResult<i64> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT count(*) FROM users WHERE email = ?1",
                    rusqlite::params![email],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }

    /// Return the total number of accounts.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// ── tests ────────────────────────────────────────────────────────────
