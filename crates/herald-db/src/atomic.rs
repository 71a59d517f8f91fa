//! All-or-nothing execution of registry operations, and consistent reads.

use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Runs `f` inside a single `BEGIN IMMEDIATE` transaction.
///
/// The transaction commits only if `f` returns `Ok`. Any error, whether a
/// validation failure raised by `f` or a SQLite failure, rolls back every
/// write `f` made, including broadcast log appends.
///
/// Must not be nested: SQLite rejects a `BEGIN` inside an open transaction.
///
/// # Errors
///
/// Returns the error produced by `f`, or a `rusqlite::Error` converted into
/// `E` if the transaction cannot be opened or committed.
pub fn run_atomic<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    match f(&tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(e)
        }
    }
}

/// Runs `f` inside a single deferred read transaction.
///
/// Under WAL every statement outside a transaction sees its own snapshot.
/// Wrapping a multi-statement read here pins one snapshot for all of its
/// SELECTs, so the result never mixes two committed states. Writers are not
/// blocked.
///
/// Must not be nested inside [`run_atomic`] or another `run_read`.
///
/// # Errors
///
/// Returns the error produced by `f`, or a `rusqlite::Error` converted into
/// `E` if the transaction cannot be opened or closed.
pub fn run_read<T, E, F>(conn: &Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let value = f(&tx)?;
    // Nothing was written; ending the snapshot is all that remains.
    tx.rollback()?;
    Ok(value)
}
