//! Database layer for Herald.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the [`run_atomic`] transaction wrapper that
//! every state-changing registry operation runs inside.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: one file holds the channel store, every
//!   ledger, and the broadcast log, so a single transaction covers a
//!   mutation and its log append.
//! - **Immediate transactions**: [`run_atomic`] takes the write lock at
//!   `BEGIN`, so concurrent writers are serialized before they validate.
//! - **Snapshot reads**: [`run_read`] holds one WAL read snapshot across
//!   every SELECT of a multi-statement read.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` and applied in order on startup.

mod atomic;
mod migrations;
mod pool;

pub use atomic::{run_atomic, run_read};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
