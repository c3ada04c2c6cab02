//! `StateStore`: the SQLite-backed pool plus shutdown integrity contract
//! from spec.md §4.2 ("no silent data loss on shutdown").

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Wraps the connection pool. Every DAO method takes a `&StateStore` and
/// opens its own transaction (spec.md §4.2: "each mutating method is
/// wrapped in a single transaction"); no DAO holds a lock across an await
/// boundary outside of its own transaction.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) pool: SqlitePool,
    in_flight: Arc<AtomicU64>,
}

impl StateStore {
    /// Open (creating if absent) the database at `path`, applying any
    /// pending migrations. Tolerates an abrupt prior exit: SQLite's WAL
    /// journal replays uncommitted pages automatically on open, so this
    /// call is safe to retry after a crash.
    pub async fn open(path: &Path) -> Result<Self, sqlx::Error> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;
        info!(path = %path.display(), "state store opened and migrated");

        Ok(Self { pool, in_flight: Arc::new(AtomicU64::new(0)) })
    }

    /// In-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool, in_flight: Arc::new(AtomicU64::new(0)) })
    }

    pub(crate) fn begin_write(&self) -> WriteGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        WriteGuard { counter: self.in_flight.clone() }
    }

    /// Flush and close the pool. Waits for any in-flight DAO writes to
    /// finish first so a concurrent `shutdown()` can never observe (or
    /// cause) a half-written row.
    pub async fn shutdown(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.pool.close().await;
        info!("state store shut down cleanly");
    }
}

/// RAII marker incrementing/decrementing the in-flight write counter used by
/// `shutdown`.
pub(crate) struct WriteGuard {
    counter: Arc<AtomicU64>,
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let store = StateStore::open_in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM users")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_writes() {
        let store = StateStore::open_in_memory().await.unwrap();
        let guard = store.begin_write();
        let store2 = store.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            drop(guard);
        });
        store.shutdown().await;
        handle.await.unwrap();
    }
}
