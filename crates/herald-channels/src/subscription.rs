//! Subscription ledger.
//!
//! A single `subscriptions` table holds the (actor, channel) relation. The
//! subscriber set of a channel is, by construction, exactly the rows whose
//! `subscribed` flag is set, so the relation and the set cannot drift apart.
//! Unsubscribing clears the flag rather than deleting the row.

use herald_db::{run_atomic, run_read};
use herald_types::{ActorId, ChannelIndex};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::ChannelError;
use crate::events::{record_event, RegistryEvent};
use crate::store::channel_admin;

/// Adds `caller` to the subscriber set of `index`.
///
/// # Errors
///
/// `NotFound` for an unknown index, `AlreadySubscribed` if the caller is
/// already a subscriber.
pub fn subscribe(conn: &Connection, caller: &ActorId, index: ChannelIndex) -> Result<(), ChannelError> {
    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        channel_admin(tx, index)?;
        if subscription_flag(tx, index, caller)? {
            return Err(ChannelError::AlreadySubscribed(index));
        }

        tx.execute(
            "INSERT INTO subscriptions (channel_idx, actor_id, subscribed)
             VALUES (?1, ?2, 1)
             ON CONFLICT (channel_idx, actor_id)
             DO UPDATE SET subscribed = 1, updated_at = datetime('now')",
            params![index, caller.as_str()],
        )?;
        record_event(tx, index, &RegistryEvent::Subscribed { actor: caller.clone() })?;
        Ok(())
    })?;

    tracing::debug!(channel = index, actor = %caller, "subscribed");
    Ok(())
}

/// Removes `caller` from the subscriber set of `index`.
///
/// # Errors
///
/// `NotFound` for an unknown index, `NotSubscribed` if the caller is not a
/// subscriber.
pub fn unsubscribe(conn: &Connection, caller: &ActorId, index: ChannelIndex) -> Result<(), ChannelError> {
    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        channel_admin(tx, index)?;
        if !subscription_flag(tx, index, caller)? {
            return Err(ChannelError::NotSubscribed(index));
        }

        tx.execute(
            "UPDATE subscriptions SET subscribed = 0, updated_at = datetime('now')
             WHERE channel_idx = ?1 AND actor_id = ?2",
            params![index, caller.as_str()],
        )?;
        record_event(tx, index, &RegistryEvent::Unsubscribed { actor: caller.clone() })?;
        Ok(())
    })?;

    tracing::debug!(channel = index, actor = %caller, "unsubscribed");
    Ok(())
}

/// A channel's subscriber set together with its size, read from one
/// snapshot so the two always agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscribers {
    pub channel_index: ChannelIndex,
    /// Sorted by actor id. Order carries no meaning.
    pub subscribers: Vec<ActorId>,
    pub count: u64,
}

/// Reports whether `actor` currently subscribes to `index`.
pub fn is_subscribed(
    conn: &Connection,
    index: ChannelIndex,
    actor: &ActorId,
) -> Result<bool, ChannelError> {
    run_read(conn, |tx| -> Result<bool, ChannelError> {
        channel_admin(tx, index)?;
        Ok(subscription_flag(tx, index, actor)?)
    })
}

/// Returns the subscriber set of `index`. Order carries no meaning.
pub fn subscribers_of(conn: &Connection, index: ChannelIndex) -> Result<Vec<ActorId>, ChannelError> {
    run_read(conn, |tx| -> Result<Vec<ActorId>, ChannelError> {
        channel_admin(tx, index)?;
        load_subscribers(tx, index)
    })
}

/// Returns the size of the subscriber set of `index`.
pub fn subscribers_count(conn: &Connection, index: ChannelIndex) -> Result<u64, ChannelError> {
    run_read(conn, |tx| -> Result<u64, ChannelError> {
        channel_admin(tx, index)?;
        count_subscribers(tx, index)
    })
}

/// Returns the subscriber set of `index` and its size in one read.
pub fn subscribers_with_count(
    conn: &Connection,
    index: ChannelIndex,
) -> Result<Subscribers, ChannelError> {
    run_read(conn, |tx| -> Result<Subscribers, ChannelError> {
        channel_admin(tx, index)?;
        Ok(Subscribers {
            channel_index: index,
            subscribers: load_subscribers(tx, index)?,
            count: count_subscribers(tx, index)?,
        })
    })
}

/// Returns the channels `actor` currently subscribes to, in index order.
pub fn subscriptions_of(conn: &Connection, actor: &ActorId) -> Result<Vec<ChannelIndex>, ChannelError> {
    let mut stmt = conn.prepare(
        "SELECT channel_idx FROM subscriptions
         WHERE actor_id = ?1 AND subscribed = 1 ORDER BY channel_idx ASC",
    )?;
    let rows = stmt.query_map([actor.as_str()], |row| row.get::<_, ChannelIndex>(0))?;
    let mut channels = Vec::new();
    for row in rows {
        channels.push(row?);
    }
    Ok(channels)
}

fn count_subscribers(conn: &Connection, index: ChannelIndex) -> Result<u64, ChannelError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE channel_idx = ?1 AND subscribed = 1",
        [index],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

pub(crate) fn load_subscribers(
    conn: &Connection,
    index: ChannelIndex,
) -> Result<Vec<ActorId>, ChannelError> {
    let mut stmt = conn.prepare(
        "SELECT actor_id FROM subscriptions
         WHERE channel_idx = ?1 AND subscribed = 1 ORDER BY actor_id ASC",
    )?;
    let rows = stmt.query_map([index], |row| row.get::<_, String>(0))?;
    let mut subscribers = Vec::new();
    for row in rows {
        subscribers.push(ActorId::new(row?));
    }
    Ok(subscribers)
}

/// The raw relation value; a missing row reads as `false`.
pub(crate) fn subscription_flag(
    conn: &Connection,
    index: ChannelIndex,
    actor: &ActorId,
) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT subscribed FROM subscriptions WHERE channel_idx = ?1 AND actor_id = ?2",
            params![index, actor.as_str()],
            |row| row.get::<_, bool>(0),
        )
        .optional()?
        .unwrap_or(false))
}
