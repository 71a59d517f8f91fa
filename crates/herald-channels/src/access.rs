//! Capability predicates and the push-access ledger.

use herald_db::{run_atomic, run_read};
use herald_types::{ActorId, ChannelIndex};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ChannelError;
use crate::events::{record_event, RegistryEvent};
use crate::store::channel_admin;

/// Reports whether `actor` is the admin of `index`.
pub fn is_admin(conn: &Connection, index: ChannelIndex, actor: &ActorId) -> Result<bool, ChannelError> {
    Ok(&channel_admin(conn, index)? == actor)
}

/// Reports whether `actor` holds a push-access grant on `index`.
///
/// The admin's own sending rights come from [`is_admin`], not from this
/// ledger, so this returns `false` for an admin without an explicit grant.
pub fn has_push_access(
    conn: &Connection,
    index: ChannelIndex,
    actor: &ActorId,
) -> Result<bool, ChannelError> {
    run_read(conn, |tx| -> Result<bool, ChannelError> {
        channel_admin(tx, index)?;
        Ok(push_access_flag(tx, index, actor)?)
    })
}

/// Sets the push-access grant of `actor` on `index` to exactly `grant`.
///
/// Setting the value it already has is not an error.
///
/// # Errors
///
/// `NotFound` for an unknown index, `Unauthorized` if `caller` is not the
/// channel admin.
pub fn set_push_access(
    conn: &Connection,
    caller: &ActorId,
    index: ChannelIndex,
    actor: &ActorId,
    grant: bool,
) -> Result<(), ChannelError> {
    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        if channel_admin(tx, index)? != *caller {
            return Err(ChannelError::unauthorized(caller, index, "set push access"));
        }

        tx.execute(
            "INSERT INTO push_access (channel_idx, actor_id, granted)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (channel_idx, actor_id)
             DO UPDATE SET granted = excluded.granted, updated_at = datetime('now')",
            params![index, actor.as_str(), grant],
        )?;

        let event = if grant {
            RegistryEvent::PushAccessGranted {
                actor: actor.clone(),
                granted_by: caller.clone(),
            }
        } else {
            RegistryEvent::PushAccessRevoked {
                actor: actor.clone(),
                revoked_by: caller.clone(),
            }
        };
        record_event(tx, index, &event)?;
        Ok(())
    })?;

    tracing::info!(channel = index, actor = %actor, grant, "push access updated");
    Ok(())
}

/// The raw grant value; a missing row reads as `false`.
pub(crate) fn push_access_flag(
    conn: &Connection,
    index: ChannelIndex,
    actor: &ActorId,
) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT granted FROM push_access WHERE channel_idx = ?1 AND actor_id = ?2",
            params![index, actor.as_str()],
            |row| row.get::<_, bool>(0),
        )
        .optional()?
        .unwrap_or(false))
}
