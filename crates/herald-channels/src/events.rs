//! Registry event feed.
//!
//! Every committed state change to the registry (a channel created or
//! edited, a subscription toggled, a push-access grant changed, settings
//! stored) appends one row to `registry_events` from inside the transaction
//! that made the change. A failed operation therefore records nothing.
//!
//! Notifications are not registry events. They are recorded once, in the
//! broadcast log, by the dispatcher.

use herald_log::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use herald_types::{ActorId, ChannelIndex};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A registry state change, tagged by `event` in its JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryEvent {
    ChannelCreated {
        admin: ActorId,
        name: String,
    },
    /// The admin overwrote the descriptive fields.
    ChannelEdited {
        admin: ActorId,
        name: String,
    },
    Subscribed {
        actor: ActorId,
    },
    Unsubscribed {
        actor: ActorId,
    },
    PushAccessGranted {
        actor: ActorId,
        granted_by: ActorId,
    },
    PushAccessRevoked {
        actor: ActorId,
        revoked_by: ActorId,
    },
    NotificationSettingsUpdated {
        actor: ActorId,
        notif_id: u64,
        /// The stored `"<notif_id>+<settings>"` value.
        settings: String,
    },
}

impl RegistryEvent {
    /// The `SCREAMING_SNAKE_CASE` label stored in `event_type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ChannelCreated { .. } => "CHANNEL_CREATED",
            Self::ChannelEdited { .. } => "CHANNEL_EDITED",
            Self::Subscribed { .. } => "SUBSCRIBED",
            Self::Unsubscribed { .. } => "UNSUBSCRIBED",
            Self::PushAccessGranted { .. } => "PUSH_ACCESS_GRANTED",
            Self::PushAccessRevoked { .. } => "PUSH_ACCESS_REVOKED",
            Self::NotificationSettingsUpdated { .. } => "NOTIFICATION_SETTINGS_UPDATED",
        }
    }

    /// The actor the change is about.
    pub fn actor(&self) -> &ActorId {
        match self {
            Self::ChannelCreated { admin, .. } | Self::ChannelEdited { admin, .. } => admin,
            Self::Subscribed { actor }
            | Self::Unsubscribed { actor }
            | Self::PushAccessGranted { actor, .. }
            | Self::PushAccessRevoked { actor, .. }
            | Self::NotificationSettingsUpdated { actor, .. } => actor,
        }
    }
}

/// A committed registry event with its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEventEntry {
    /// Strictly increasing, never reused.
    pub seq: i64,
    pub channel_index: ChannelIndex,
    pub event_type: String,
    pub payload: RegistryEvent,
    /// ISO 8601 commit timestamp.
    pub emitted_at: String,
}

/// Filter criteria for reading the registry event feed.
#[derive(Debug, Clone, Default)]
pub struct RegistryEventFilter {
    /// Only events with `seq` strictly greater than this cursor.
    pub after_seq: Option<i64>,
    pub channel: Option<ChannelIndex>,
    /// Only events about this actor.
    pub actor: Option<ActorId>,
    /// Clamped to `1..=MAX_QUERY_LIMIT`; defaults to `DEFAULT_QUERY_LIMIT`.
    pub limit: Option<i64>,
}

/// Appends `event` for channel `index`.
///
/// Runs on the caller's transaction; the row exists iff it commits.
pub(crate) fn record_event(
    conn: &Connection,
    index: ChannelIndex,
    event: &RegistryEvent,
) -> Result<i64, ChannelError> {
    let payload_json = serde_json::to_string(event)?;
    let seq = conn.query_row(
        "INSERT INTO registry_events (channel_idx, event_type, actor_id, payload_json)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING seq",
        params![index, event.event_type(), event.actor().as_str(), payload_json],
        |row| row.get::<_, i64>(0),
    )?;
    tracing::trace!(seq, channel = index, event_type = event.event_type(), "registry event recorded");
    Ok(seq)
}

/// Reads the registry event feed in ascending `seq` order.
///
/// # Errors
///
/// `Database` on SQL failure, `Payload` if a stored payload no longer
/// decodes.
pub fn registry_events(
    conn: &Connection,
    filter: &RegistryEventFilter,
) -> Result<Vec<RegistryEventEntry>, ChannelError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(after) = filter.after_seq {
        values.push(Box::new(after));
        clauses.push(format!("seq > ?{}", values.len()));
    }
    if let Some(channel) = filter.channel {
        values.push(Box::new(channel));
        clauses.push(format!("channel_idx = ?{}", values.len()));
    }
    if let Some(ref actor) = filter.actor {
        values.push(Box::new(actor.as_str().to_string()));
        clauses.push(format!("actor_id = ?{}", values.len()));
    }

    let limit = filter
        .limit
        .unwrap_or(DEFAULT_QUERY_LIMIT)
        .clamp(1, MAX_QUERY_LIMIT);
    values.push(Box::new(limit));
    let limit_idx = values.len();

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT seq, channel_idx, event_type, payload_json, emitted_at
         FROM registry_events {where_clause} ORDER BY seq ASC LIMIT ?{limit_idx}"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| &**v).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), map_row_to_event)?;

    let mut entries = Vec::new();
    for row in rows {
        let (seq, channel_index, event_type, payload_json, emitted_at) = row?;
        entries.push(RegistryEventEntry {
            seq,
            channel_index,
            event_type,
            payload: serde_json::from_str(&payload_json)?,
            emitted_at,
        });
    }
    Ok(entries)
}

type EventRow = (i64, ChannelIndex, String, String, String);

fn map_row_to_event(row: &Row) -> rusqlite::Result<EventRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}
