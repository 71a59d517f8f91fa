//! Per-subscriber notification settings.

use herald_db::{run_atomic, run_read};
use herald_types::{ActorId, ChannelIndex, MAX_NOTIF_SETTINGS_LEN};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ChannelError;
use crate::events::{record_event, RegistryEvent};
use crate::store::channel_admin;
use crate::subscription::subscription_flag;

/// Stores the caller's preferences for notification type `notif_id` on a
/// channel they subscribe to. Returns the stored value, `"{notif_id}+{settings}"`.
///
/// Settings are opaque to the registry and overwrite any previous value.
///
/// # Errors
///
/// `NotFound` for an unknown index, `InvalidArgument` if `settings` exceeds
/// [`MAX_NOTIF_SETTINGS_LEN`] bytes, `NotSubscribed` if the caller is not a
/// subscriber.
pub fn set_notification_settings(
    conn: &Connection,
    caller: &ActorId,
    index: ChannelIndex,
    notif_id: u64,
    settings: &str,
) -> Result<String, ChannelError> {
    if settings.len() > MAX_NOTIF_SETTINGS_LEN {
        return Err(ChannelError::InvalidArgument(format!(
            "notification settings exceed {MAX_NOTIF_SETTINGS_LEN} bytes"
        )));
    }
    let stored = format!("{notif_id}+{settings}");

    run_atomic(conn, |tx| -> Result<(), ChannelError> {
        channel_admin(tx, index)?;
        if !subscription_flag(tx, index, caller)? {
            return Err(ChannelError::NotSubscribed(index));
        }

        tx.execute(
            "INSERT INTO notification_settings (channel_idx, actor_id, settings)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (channel_idx, actor_id)
             DO UPDATE SET settings = excluded.settings, updated_at = datetime('now')",
            params![index, caller.as_str(), stored],
        )?;
        record_event(
            tx,
            index,
            &RegistryEvent::NotificationSettingsUpdated {
                actor: caller.clone(),
                notif_id,
                settings: stored.clone(),
            },
        )?;
        Ok(())
    })?;

    tracing::debug!(channel = index, actor = %caller, notif_id, "notification settings stored");
    Ok(stored)
}

/// Returns the stored settings of `actor` on `index`, if any.
pub fn get_notification_settings(
    conn: &Connection,
    index: ChannelIndex,
    actor: &ActorId,
) -> Result<Option<String>, ChannelError> {
    run_read(conn, |tx| -> Result<Option<String>, ChannelError> {
        channel_admin(tx, index)?;
        Ok(tx
            .query_row(
                "SELECT settings FROM notification_settings
                 WHERE channel_idx = ?1 AND actor_id = ?2",
                params![index, actor.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    })
}
