//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.
//!
//! The policy for an out-of-date schema is chosen at construction time
//! via [`MigrationPolicy`]; destructive recreation is available but must
//! be opted into, never silently applied.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema — users and journal_entries",
        sql: r#"
            CREATE TABLE users (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name     TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at    INTEGER NOT NULL
            );

            CREATE TABLE journal_entries (
                entry_id   INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                emotion    TEXT NOT NULL,
                text       TEXT NOT NULL,
                is_pinned  BOOLEAN NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX idx_journal_entries_account ON journal_entries(account_id);
            CREATE INDEX idx_journal_entries_created ON journal_entries(created_at);
        "#,
    },
    Migration {
        version: 2,
        description: "video metadata cache — videos table",
        sql: r#"
            CREATE TABLE videos (
                video_id      TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                display_order INTEGER NOT NULL
            );
        "#,
    },
];

/// How to reconcile an on-disk schema whose version does not match this
/// build.
///
/// `DestructiveRecreate` drops every known table and rebuilds the schema
/// empty on *any* mismatch, newer or older. All accounts and journal
/// entries are lost when it fires — acceptable for a pure cache, a
/// deliberate data-loss trade-off for anything else. The session slot
/// lives outside the relational schema and survives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MigrationPolicy {
    /// Apply pending migrations in order; refuse to touch a schema
    /// newer than this build understands.
    #[default]
    Incremental,
    /// Drop and recreate the whole schema on any version mismatch.
    DestructiveRecreate,
}

// ── public API ───────────────────────────────────────────────────────

/// Bring the schema up to date under `policy`.
///
/// This is a **synchronous** function — call it from the storage worker
/// (see `Database::run_migrations`).
pub fn run(conn: &Connection, policy: MigrationPolicy) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let latest = latest_version();

    match policy {
        MigrationPolicy::Incremental => {
            if current > latest {
                return Err(StoreError::Migration {
                    version: current,
                    message: format!(
                        "database schema v{current} is newer than this build supports (v{latest})"
                    ),
                });
            }
            run_pending(conn, current)
        }
        MigrationPolicy::DestructiveRecreate => {
            if current == latest {
                debug!(current_version = current, "database schema is up to date");
                return Ok(());
            }
            if current != 0 {
                warn!(
                    current_version = current,
                    target_version = latest,
                    "schema version mismatch — dropping and recreating all tables, stored data will be lost"
                );
            }
            recreate(conn)
        }
    }
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Migration {
            version: 0,
            message: format!("failed to read current version: {e}"),
        })?;
    Ok(version)
}

/// The newest schema version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

// ── internals ────────────────────────────────────────────────────────

/// Apply every migration newer than `current`, in order.
fn run_pending(conn: &Connection, current: u32) -> StoreResult<()> {
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }

    info!(new_version = latest_version(), "all migrations applied");
    Ok(())
}

/// Drop every known table and rebuild the schema from scratch.
fn recreate(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS journal_entries;
         DROP TABLE IF EXISTS videos;
         DROP TABLE IF EXISTS users;
         DROP TABLE IF EXISTS _migrations;",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to drop tables for recreation: {e}"),
    })?;

    ensure_migrations_table(conn)?;
    run_pending(conn, 0)
}

/// Create the `_migrations` bookkeeping table if it does not exist.
fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;
    Ok(())
}

/// Apply a single migration inside a transaction.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to begin transaction: {e}"),
        })?;

    let result = (|| -> StoreResult<()> {
        conn.execute_batch(migration.sql)
            .map_err(|e| StoreError::Migration {
                version: migration.version,
                message: format!("SQL execution failed: {e}"),
            })?;

        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![migration.version, migration.description, now],
        )
        .map_err(|e| StoreError::Migration {
            version: migration.version,
            message: format!("failed to record migration: {e}"),
        })?;

        Ok(())
    })();

    match &result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    message: format!("failed to commit: {e}"),
                })?;
            info!(version = migration.version, "migration applied successfully");
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
        }
    }

    result
}

// ── tests ────────────────────────────────────────────────────────────
