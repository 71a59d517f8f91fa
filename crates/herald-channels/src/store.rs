//! Channel store: creation, admin-only edits, and reads.

use herald_db::{run_atomic, run_read};
use herald_types::{ActorId, ChannelIndex};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::events::{record_event, RegistryEvent};

/// A notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Stable position in the channel store.
    pub index: ChannelIndex,
    pub name: String,
    pub description: String,
    pub icon_ref: String,
    pub badge_ref: String,
    /// Creator of the channel. Never changes.
    pub admin: ActorId,
    /// Current subscribers. Order carries no meaning.
    pub subscribers: Vec<ActorId>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Timestamp of the last edit (ISO 8601).
    pub updated_at: String,
}

/// The admin-editable descriptive fields of a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelParams {
    pub name: String,
    pub description: String,
    pub icon_ref: String,
    pub badge_ref: String,
}

/// Creates a channel administered by `caller` and returns its index.
///
/// Never fails for authorization reasons: any actor may create channels.
/// The new index is the number of channels that existed before the call.
///
/// # Errors
///
/// Returns `ChannelError::Database` on SQL failure.
pub fn create_channel(
    conn: &Connection,
    caller: &ActorId,
    params: &ChannelParams,
) -> Result<ChannelIndex, ChannelError> {
    let index = run_atomic(conn, |tx| -> Result<ChannelIndex, ChannelError> {
        let index = tx.query_row(
            "INSERT INTO channels (channel_idx, name, description, icon_ref, badge_ref, admin_id)
             VALUES ((SELECT COUNT(*) FROM channels), ?1, ?2, ?3, ?4, ?5)
             RETURNING channel_idx",
            params![
                params.name,
                params.description,
                params.icon_ref,
                params.badge_ref,
                caller.as_str(),
            ],
            |row| row.get::<_, ChannelIndex>(0),
        )?;
        record_event(
            tx,
            index,
            &RegistryEvent::ChannelCreated {
                admin: caller.clone(),
                name: params.name.clone(),
            },
        )?;
        Ok(index)
    })?;

    tracing::info!(channel = index, admin = %caller, "channel created");
    Ok(index)
}

/// Overwrites the descriptive fields of a channel.
///
/// The admin and the subscriber set are untouched.
///
/// # Errors
///
/// `NotFound` for an unknown index, `Unauthorized` if `caller` is not the
/// channel admin.
pub fn edit_channel(
    conn: &Connection,
    caller: &ActorId,
    index: ChannelIndex,
    params: &ChannelParams,
) -> Result<(), ChannelError> {
    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        let admin = channel_admin(tx, index)?;
        if &admin != caller {
            return Err(ChannelError::unauthorized(caller, index, "edit channel"));
        }

        tx.execute(
            "UPDATE channels
             SET name = ?1, description = ?2, icon_ref = ?3, badge_ref = ?4,
                 updated_at = datetime('now')
             WHERE channel_idx = ?5",
            params![
                params.name,
                params.description,
                params.icon_ref,
                params.badge_ref,
                index,
            ],
        )?;
        record_event(
            tx,
            index,
            &RegistryEvent::ChannelEdited {
                admin,
                name: params.name.clone(),
            },
        )?;
        Ok(())
    })?;

    tracing::debug!(channel = index, "channel edited");
    Ok(())
}

/// Retrieves a channel and its current subscribers from one snapshot.
pub fn get_channel(conn: &Connection, index: ChannelIndex) -> Result<Channel, ChannelError> {
    run_read(conn, |tx| -> Result<Channel, ChannelError> {
        let mut channel = tx
            .query_row(
                "SELECT channel_idx, name, description, icon_ref, badge_ref, admin_id,
                        created_at, updated_at
                 FROM channels WHERE channel_idx = ?1",
                [index],
                map_row_to_channel,
            )
            .optional()?
            .ok_or(ChannelError::NotFound(index))?;

        channel.subscribers = crate::subscription::load_subscribers(tx, index)?;
        Ok(channel)
    })
}

/// Lists every channel in index order, each with its subscribers.
///
/// Channel rows and subscriber rows come from the same snapshot.
pub fn all_channels(conn: &Connection) -> Result<Vec<Channel>, ChannelError> {
    run_read(conn, |tx| -> Result<Vec<Channel>, ChannelError> {
        let mut stmt = tx.prepare(
            "SELECT channel_idx, name, description, icon_ref, badge_ref, admin_id,
                    created_at, updated_at
             FROM channels ORDER BY channel_idx ASC",
        )?;
        let rows = stmt.query_map([], map_row_to_channel)?;
        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }

        // Indices are dense, so position in the vector equals channel index.
        let mut stmt = tx.prepare(
            "SELECT channel_idx, actor_id FROM subscriptions
             WHERE subscribed = 1 ORDER BY channel_idx ASC, actor_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, ChannelIndex>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (index, actor) = row?;
            let channel = channels
                .get_mut(index as usize)
                .ok_or(ChannelError::NotFound(index))?;
            channel.subscribers.push(ActorId::new(actor));
        }

        Ok(channels)
    })
}

/// Returns the admin of `index`, or `NotFound`.
pub(crate) fn channel_admin(conn: &Connection, index: ChannelIndex) -> Result<ActorId, ChannelError> {
    conn.query_row(
        "SELECT admin_id FROM channels WHERE channel_idx = ?1",
        [index],
        |row| row.get::<_, String>(0),
    )
    .optional()?
    .map(ActorId::new)
    .ok_or(ChannelError::NotFound(index))
}

fn map_row_to_channel(row: &Row) -> rusqlite::Result<Channel> {
    Ok(Channel {
        index: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon_ref: row.get(3)?,
        badge_ref: row.get(4)?,
        admin: ActorId::new(row.get::<_, String>(5)?),
        subscribers: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
