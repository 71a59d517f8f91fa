//! Public key registry.
//!
//! Senders look up a recipient's key here before encrypting a private
//! notification. Keys are opaque strings; no format is enforced.

use herald_db::run_atomic;
use herald_types::ActorId;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ChannelError;

/// Registers `key` as the public key of `caller`, replacing any previous one.
pub fn set_public_key(conn: &Connection, caller: &ActorId, key: &str) -> Result<(), ChannelError> {
    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        tx.execute(
            "INSERT INTO public_keys (actor_id, public_key) VALUES (?1, ?2)
             ON CONFLICT (actor_id)
             DO UPDATE SET public_key = excluded.public_key, updated_at = datetime('now')",
            params![caller.as_str(), key],
        )?;
        Ok(())
    })?;

    tracing::debug!(actor = %caller, "public key registered");
    Ok(())
}

/// Returns the registered public key of `actor`, if any.
pub fn get_public_key(conn: &Connection, actor: &ActorId) -> Result<Option<String>, ChannelError> {
    Ok(conn
        .query_row(
            "SELECT public_key FROM public_keys WHERE actor_id = ?1",
            [actor.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}
