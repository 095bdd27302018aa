//! SQLite database handle backed by a single sequential storage worker.
//!
//! The [`Database`] struct is a cloneable handle to one dedicated thread
//! that exclusively owns the `rusqlite::Connection`. Every operation is
//! boxed as a job, sent over an unbounded FIFO channel, and executed by
//! the worker one at a time; results come back on `tokio::sync::oneshot`
//! channels, resuming the caller on its original async context.
//!
//! This gives a system-wide total order over all storage operations:
//! no two jobs ever run concurrently, and jobs submitted from one handle
//! execute in submission order. There is no priority, cancellation, or
//! timeout — queued work always runs to completion. The worker exits
//! once every handle has been dropped and the queue has drained.

use std::future::Future;
use std::path::Path;

use crossbeam::channel::{self, Sender};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration::{self, MigrationPolicy};

/// A unit of work executed by the storage worker.
type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Cloneable handle to the sequential storage worker.
///
/// All read/write operations go through [`Database::execute`] /
/// [`Database::execute_mut`], which enqueue a closure for the worker
/// thread and await its result. Connection-free work (e.g. the session
/// slot file) can be serialized into the same total order via
/// [`Database::submit`].
#[derive(Clone)]
pub struct Database {
    tx: Sender<Job>,
}

impl Database {
    /// Open (or create) a database at `path`, apply pragmas, and spawn
    /// the storage worker.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        Self::apply_pragmas(&conn)?;
        Self::spawn_worker(conn)
    }

    /// Create an in-memory database — useful for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("opening in-memory database");

        let conn = Connection::open_in_memory()?;
        Self::apply_pragmas(&conn)?;
        Self::spawn_worker(conn)
    }

    /// Open the database and bring the schema up to date under `policy`.
    pub async fn open_and_migrate(
        path: impl AsRef<Path> + Send + 'static,
        policy: MigrationPolicy,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = tokio::task::spawn_blocking(move || Self::open(&path)).await??;
        db.run_migrations(policy).await?;
        Ok(db)
    }

    /// Run schema migrations under the given policy.
    pub async fn run_migrations(&self, policy: MigrationPolicy) -> StoreResult<()> {
        self.execute(move |conn| migration::run(conn, policy)).await
    }

    /// Execute a closure against the connection on the storage worker.
    ///
    /// This is the primary way to interact with the database from async
    /// code. The closure receives a `&Connection` and must return a
    /// `StoreResult<T>`.
    ///
    /// The job is enqueued when `execute` is *called*, not when the
    /// returned future is first polled, so submission order is call
    /// order. Dropping the future discards the result but the job
    /// still runs.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let count: i64 = db.execute(|conn| {
    ///     let mut stmt = conn.prepare("SELECT count(*) FROM users")?;
    ///     let count = stmt.query_row([], |row| row.get(0))?;
    ///     Ok(count)
    /// }).await?;
    /// ```
    pub fn execute<F, T>(&self, f: F) -> impl Future<Output = StoreResult<T>> + use<F, T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move |conn| f(conn))
    }

    /// Execute a mutable closure (for transactions, etc.) on the worker.
    ///
    /// The closure receives a `&mut Connection` so you can call
    /// `conn.transaction()` and friends.
    pub fn execute_mut<F, T>(&self, f: F) -> impl Future<Output = StoreResult<T>> + use<F, T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(f)
    }

    /// Run connection-free work on the worker, in the same total order
    /// as database operations.
    ///
    /// The session slot lives in a file outside the relational schema;
    /// routing its reads and writes through here keeps the "one logical
    /// thread touches durable state" guarantee intact.
    pub fn submit<F, T>(&self, f: F) -> impl Future<Output = StoreResult<T>> + use<F, T>
    where
        F: FnOnce() -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move |_conn| f())
    }

    // ── worker ───────────────────────────────────────────────────────

    fn spawn_worker(mut conn: Connection) -> StoreResult<Self> {
        let (tx, rx) = channel::unbounded::<Job>();

        // The worker owns the sole connection. `recv` drains remaining
        // jobs before erroring out once the last sender is gone, so
        // queued work always runs.
        std::thread::Builder::new()
            .name("mindjar-storage".into())
            .spawn(move || {
                debug!("storage worker started");
                while let Ok(job) = rx.recv() {
                    job(&mut conn);
                }
                debug!("storage worker exiting");
            })?;

        Ok(Self { tx })
    }

    /// Enqueue a job synchronously and hand back a future for its result.
    fn enqueue<F, T>(&self, f: F) -> impl Future<Output = StoreResult<T>> + use<F, T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have dropped its future; the job still ran.
            let _ = result_tx.send(f(conn));
        });

        let sent = self
            .tx
            .send(job)
            .map_err(|_| StoreError::Worker("storage worker has shut down".into()));

        async move {
            sent?;
            result_rx
                .await
                .map_err(|_| StoreError::Worker("storage worker dropped the result".into()))?
        }
    }

    // ── pragmas ──────────────────────────────────────────────────────

    /// Apply pragmas to a fresh connection.
    fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
        debug!("applying SQLite pragmas");

        // WAL mode: readers never block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // NORMAL sync is safe with WAL — we only lose the last transaction
        // on a power failure, not corruption.
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        // Enforce foreign key constraints.
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // Busy timeout so an external reader waits instead of failing.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        info!("database pragmas applied (WAL, NORMAL sync)");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
