//! Pooled SQLite connections.
//!
//! Every connection the pool hands out has gone through `init_connection`,
//! so callers never see a connection without foreign keys or a busy timeout.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection tunables, read from the `[database]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on `BEGIN IMMEDIATE` before failing, in ms.
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build connection pool for {path}: {source}")]
    Build {
        path: String,
        #[source]
        source: r2d2::Error,
    },
}

/// Prepares a freshly opened connection for registry use.
///
/// Switches to WAL so snapshot reads never block the single writer, turns
/// on foreign keys and sets the busy timeout. An in-memory database stays
/// in `memory` journal mode; anything else that refuses WAL is an error.
fn init_connection(conn: &Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !matches!(mode.as_str(), "wal" | "memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed {mode}, expected wal")),
        ));
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}

/// Opens (creating if needed) the database at `db_path` behind an r2d2 pool.
///
/// Each pooled `:memory:` connection is its own database, so anything that
/// shares state across connections must use a file path.
///
/// # Errors
///
/// `PoolError::Build` if the pool cannot open its first connection.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| init_connection(conn, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)
        .map_err(|source| PoolError::Build {
            path: db_path.to_string(),
            source,
        })?;

    tracing::debug!(path = db_path, max = settings.pool_max_size, "database pool ready");
    Ok(pool)
}
