//! Notification dispatcher.
//!
//! A send is validated and logged inside one transaction, in this order:
//! channel lookup, sender authorization, recipient subscription (targeted
//! sends only), then exactly one append to the broadcast log. The first
//! failing check aborts the call and nothing is appended.

use herald_db::run_atomic;
use herald_log::{append_record, LogEntry, NotificationRecord};
use herald_types::{ActorId, ChannelIndex, NotificationContent};
use rusqlite::Connection;

use crate::access::push_access_flag;
use crate::error::ChannelError;
use crate::store::channel_admin;
use crate::subscription::subscription_flag;

/// Sends a notification to one subscriber of `index`.
///
/// A private notification may only come from the channel admin; a
/// push-access grant does not extend to private sends. A public one may come
/// from the admin or from any push-access holder. The content is logged
/// exactly as given.
///
/// # Errors
///
/// `NotFound`, then `Unauthorized`, then `RecipientNotSubscribed`, checked
/// in that order.
pub fn notify_one(
    conn: &Connection,
    caller: &ActorId,
    recipient: &ActorId,
    index: ChannelIndex,
    content: &NotificationContent,
    is_private: bool,
) -> Result<LogEntry, ChannelError> {
    let entry = run_atomic(conn, |tx| -> Result<LogEntry, ChannelError> {
        let admin = channel_admin(tx, index)?;
        let sender_is_admin = admin == *caller;

        if is_private {
            if !sender_is_admin {
                return Err(ChannelError::unauthorized(
                    caller,
                    index,
                    "send private notification",
                ));
            }
        } else if !sender_is_admin && !push_access_flag(tx, index, caller)? {
            return Err(ChannelError::unauthorized(caller, index, "send notification"));
        }

        if !subscription_flag(tx, index, recipient)? {
            return Err(ChannelError::RecipientNotSubscribed {
                recipient: recipient.clone(),
                channel: index,
            });
        }

        let record = NotificationRecord::Targeted {
            channel: index,
            sender: caller.clone(),
            recipient: recipient.clone(),
            is_private,
            content: content.clone(),
        };
        Ok(append_record(tx, &record)?)
    })?;

    tracing::debug!(
        seq = entry.seq,
        channel = index,
        sender = %caller,
        recipient = %recipient,
        is_private,
        "targeted notification logged"
    );
    Ok(entry)
}

/// Sends a notification to every subscriber of `index`.
///
/// Only the admin or a push-access holder may broadcast. The record declares
/// the message valid for the channel; fan-out to individual subscribers
/// happens downstream of the log.
///
/// # Errors
///
/// `NotFound`, then `Unauthorized`.
pub fn notify_all(
    conn: &Connection,
    caller: &ActorId,
    index: ChannelIndex,
    content: &NotificationContent,
) -> Result<LogEntry, ChannelError> {
    let entry = run_atomic(conn, |tx| -> Result<LogEntry, ChannelError> {
        let admin = channel_admin(tx, index)?;
        if admin != *caller && !push_access_flag(tx, index, caller)? {
            return Err(ChannelError::unauthorized(caller, index, "broadcast notification"));
        }

        let record = NotificationRecord::Broadcast {
            channel: index,
            sender: caller.clone(),
            content: content.clone(),
        };
        Ok(append_record(tx, &record)?)
    })?;

    tracing::debug!(seq = entry.seq, channel = index, sender = %caller, "broadcast notification logged");
    Ok(entry)
}
