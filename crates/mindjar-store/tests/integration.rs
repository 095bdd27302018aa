//! Integration tests for the mindjar-store crate.
//!
//! These tests exercise the full lifecycle — migrations, sign-up and
//! login, session persistence, journal ordering, and the video cache —
//! against a real SQLite database on disk (via tempfile).

use std::path::Path;

use mindjar_store::{
    AccountStore, CredentialService, Database, JournalStore, MigrationPolicy, SessionStore,
    StoreError, VideoCacheItem, VideoCacheStore,
};

async fn open_db(dir: &Path) -> Database {
    Database::open_and_migrate(dir.join("mindjar.db"), MigrationPolicy::Incremental)
        .await
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
//  Database lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn database_open_and_migrate_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).await;

    // Verify core tables exist by querying them.
    for table in ["users", "journal_entries", "videos"] {
        let count: i64 = db
            .execute(move |conn| {
                let c: i64 =
                    conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
                Ok(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 0, "{table} should start empty");
    }

    assert!(dir.path().join("mindjar.db").exists());
}

#[tokio::test]
async fn database_open_and_migrate_idempotent() {
    let dir = tempfile::tempdir().unwrap();

    let db1 = open_db(dir.path()).await;
    drop(db1);

    let db2 = open_db(dir.path()).await;
    let version = db2
        .execute(|conn| mindjar_store::migration::current_version(conn))
        .await
        .unwrap();
    assert_eq!(version, mindjar_store::migration::latest_version());
}

// ═══════════════════════════════════════════════════════════════════════
//  Sign-up / login scenario
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn signup_duplicate_and_verify_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).await;
    let auth = CredentialService::new(AccountStore::new(db));

    // Jane signs up and gets the first id.
    let id = auth
        .create_account("Jane", "jane@x.com", "Passw0rd!")
        .await
        .unwrap();
    assert_eq!(id, 1);

    // A second sign-up with the same email fails.
    let dup = auth.create_account("Jane", "jane@x.com", "Passw0rd!").await;
    assert!(matches!(dup, Err(StoreError::DuplicateEmail { .. })));

    // The stored hash verifies the right password and rejects the wrong one.
    let account = auth.find_by_email("jane@x.com").await.unwrap().unwrap();
    assert!(
        auth.verify_password("Passw0rd!", &account.password_hash)
            .await
            .unwrap()
    );
    assert!(
        !auth
            .verify_password("wrong", &account.password_hash)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn accounts_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = open_db(dir.path()).await;
        let auth = CredentialService::new(AccountStore::new(db));
        auth.create_account("Jane", "jane@x.com", "Passw0rd!")
            .await
            .unwrap();
    }

    // Reopen fresh, as after a process restart.
    let db = open_db(dir.path()).await;
    let auth = CredentialService::new(AccountStore::new(db));
    let account = auth.find_by_email("jane@x.com").await.unwrap().unwrap();
    assert!(
        auth.verify_password("Passw0rd!", &account.password_hash)
            .await
            .unwrap()
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Session persistence across restarts
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn session_round_trip_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let slot_path = dir.path().join("session.json");

    {
        let db = open_db(dir.path()).await;
        let sessions = SessionStore::new(db, &slot_path);
        sessions.set_logged_in_account(7).await.unwrap();
    }

    let db = open_db(dir.path()).await;
    let sessions = SessionStore::new(db, &slot_path);
    assert_eq!(sessions.get_logged_in_account().await.unwrap(), Some(7));

    sessions.clear_session().await.unwrap();
    assert_eq!(sessions.get_logged_in_account().await.unwrap(), None);
}

#[tokio::test]
async fn session_survives_destructive_recreation() {
    let dir = tempfile::tempdir().unwrap();
    let slot_path = dir.path().join("session.json");

    {
        let db = open_db(dir.path()).await;
        let sessions = SessionStore::new(db.clone(), &slot_path);
        sessions.set_logged_in_account(7).await.unwrap();

        // Simulate a schema written by a future build.
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (99, 'future', 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
    }

    // Reopen destructively: the relational data is recreated empty,
    // but the session slot lives outside the schema and survives.
    let db = Database::open_and_migrate(
        dir.path().join("mindjar.db"),
        MigrationPolicy::DestructiveRecreate,
    )
    .await
    .unwrap();
    let sessions = SessionStore::new(db.clone(), &slot_path);
    assert_eq!(sessions.get_logged_in_account().await.unwrap(), Some(7));

    let users: i64 = db
        .execute(|conn| {
            let c: i64 = conn.query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
            Ok(c)
        })
        .await
        .unwrap();
    assert_eq!(users, 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Journal flow across stores
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn journal_flow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).await;
    let auth = CredentialService::new(AccountStore::new(db.clone()));
    let journal = JournalStore::new(db);

    let jane = auth
        .create_account("Jane", "jane@x.com", "Passw0rd!")
        .await
        .unwrap();
    let other = auth
        .create_account("Sam", "sam@x.com", "Passw0rd!")
        .await
        .unwrap();

    for (emotion, text) in [("happy", "good start"), ("anxious", "rough meeting"), ("calm", "evening walk")] {
        journal.add_entry(jane, emotion, text).await.unwrap();
    }
    journal.add_entry(other, "happy", "not jane's").await.unwrap();

    let entries = journal.list_entries(jane).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.account_id == jane));
    for pair in entries.windows(2) {
        assert!(
            pair[0].created_at > pair[1].created_at
                || (pair[0].created_at == pair[1].created_at
                    && pair[0].entry_id < pair[1].entry_id)
        );
    }

    // Pin one entry via the full-row update path.
    let mut pinned = entries[2].clone();
    pinned.is_pinned = true;
    assert_eq!(journal.update_entry(&pinned).await.unwrap(), 1);
    let fetched = journal.get_entry(pinned.entry_id).await.unwrap().unwrap();
    assert!(fetched.is_pinned);
}

// ═══════════════════════════════════════════════════════════════════════
//  Video cache refresh
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn video_cache_refresh_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).await;
    let videos = VideoCacheStore::new(db);

    assert_eq!(videos.count().await.unwrap(), 0);

    // Cold cache: the "remote" loader runs once.
    let written = videos
        .populate_if_empty(|| async {
            Ok(vec![
                VideoCacheItem {
                    video_id: "v2".into(),
                    title: "Box breathing".into(),
                    display_order: 2,
                },
                VideoCacheItem {
                    video_id: "v1".into(),
                    title: "Morning check-in".into(),
                    display_order: 1,
                },
            ])
        })
        .await
        .unwrap();
    assert_eq!(written, 2);

    let all = videos.get_all().await.unwrap();
    assert_eq!(all[0].video_id, "v1");
    assert_eq!(all[1].video_id, "v2");
    assert_eq!(all[0].embed_url(), "https://www.youtube.com/embed/v1");

    // Warm cache: the loader is skipped.
    let written = videos
        .populate_if_empty(|| async { unreachable!("cache is warm") })
        .await
        .unwrap();
    assert_eq!(written, 0);

    // A later refresh replaces rows in place, last writer wins.
    videos
        .upsert(VideoCacheItem {
            video_id: "v1".into(),
            title: "Morning check-in (updated)".into(),
            display_order: 1,
        })
        .await
        .unwrap();
    let all = videos.get_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].title, "Morning check-in (updated)");
}

// ═══════════════════════════════════════════════════════════════════════
//  Sequential worker ordering
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn storage_operations_are_totally_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path()).await;
    let journal = JournalStore::new(db.clone());

    // Queue a slow job, then an add_entry, without awaiting in between.
    // The entry's created_at is stamped at execution time, so it lands
    // after the slow job finished — not at enqueue time.
    let enqueued_at = chrono::Utc::now().timestamp_millis();
    let slow = db.submit(|| {
        std::thread::sleep(std::time::Duration::from_millis(150));
        Ok(())
    });
    let add = journal.add_entry(1, "happy", "after the slow job");

    slow.await.unwrap();
    let id = add.await.unwrap();

    let entry = journal.get_entry(id).await.unwrap().unwrap();
    assert!(
        entry.created_at >= enqueued_at + 150,
        "created_at {} should be stamped when the queued insert ran",
        entry.created_at
    );
}
