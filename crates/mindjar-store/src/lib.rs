//! # mindjar-store
//!
//! Local persistence and authentication core for MindJar, a
//! mood-journaling application.
//!
//! Provides SQLite-backed storage for accounts, journal entries, and a
//! video metadata cache, PBKDF2 password hashing via `ring`, a
//! single-slot login session, and a sequential storage worker that
//! serializes every durable operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  CredentialService (PBKDF2, ring)            │
//! ├──────────────────────────────────────────────┤
//! │  AccountStore    (users, UNIQUE email)       │
//! │  JournalStore    (journal_entries, ordered)  │
//! │  VideoCacheStore (videos, upsert cache)      │
//! │  SessionStore    (JSON slot file)            │
//! ├──────────────────────────────────────────────┤
//! │  Database  (single worker, FIFO queue)       │
//! │  Migrations (versioned, policy-selectable)   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The `Database` worker thread is the only entity that touches the
//! SQLite file; every store operation is queued onto it and executed
//! one at a time, giving a system-wide total order without locks.
//!
//! ## Quick start
//!
//! ```ignore
//! use mindjar_store::{
//!     AccountStore, CredentialService, Database, JournalStore, MigrationPolicy,
//! };
//!
//! let db = Database::open_and_migrate("data/mindjar.db", MigrationPolicy::Incremental).await?;
//! let auth = CredentialService::new(AccountStore::new(db.clone()));
//! let journal = JournalStore::new(db.clone());
//!
//! let id = auth.create_account("Jane", "jane@x.com", "Passw0rd!").await?;
//! journal.add_entry(id, "happy", "signed up today").await?;
//! ```

pub mod account_store;
pub mod auth;
pub mod db;
pub mod error;
pub mod journal_store;
pub mod migration;
pub mod session;
pub mod video_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use account_store::{Account, AccountStore, NewAccount};
pub use auth::CredentialService;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use journal_store::{JournalEntry, JournalStore};
pub use migration::MigrationPolicy;
pub use session::SessionStore;
pub use video_store::{VideoCacheItem, VideoCacheStore};
