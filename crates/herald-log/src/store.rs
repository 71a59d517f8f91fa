//! Persistence operations for the broadcast log.
//!
//! Writes go through [`append_record`]; reads go through [`query_log`],
//! which pages by sequence number so consumers can resume after a
//! reconnect from the last `seq` they processed.

use herald_types::{ActorId, ChannelIndex, NotificationContent, NotificationKind};
use rusqlite::{params, Connection, Row};

use crate::error::LogError;
use crate::record::{LogEntry, NotificationRecord};

/// Number of entries returned when a filter carries no limit.
pub const DEFAULT_QUERY_LIMIT: i64 = 100;

/// Upper bound on the number of entries a single query may return.
pub const MAX_QUERY_LIMIT: i64 = 1000;

const SELECT_COLUMNS: &str = "seq, kind, channel_idx, sender_id, recipient_id, is_private,
    title, action, body, image_ref, emitted_at";

/// Appends a single record to the broadcast log.
///
/// The insert does not open its own transaction: callers append inside the
/// transaction that validated the send, so the entry exists iff that
/// transaction commits.
///
/// # Errors
///
/// Returns `LogError::Database` on SQL failure, including a foreign key
/// violation when the record names a channel that does not exist.
pub fn append_record(conn: &Connection, record: &NotificationRecord) -> Result<LogEntry, LogError> {
    let content = record.content();

    let (seq, emitted_at) = conn.query_row(
        "INSERT INTO broadcast_log
            (kind, channel_idx, sender_id, recipient_id, is_private, title, action, body, image_ref)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING seq, emitted_at",
        params![
            record.kind().as_str(),
            record.channel(),
            record.sender().as_str(),
            record.recipient().map(ActorId::as_str),
            record.is_private(),
            content.title,
            content.action,
            content.body,
            content.image_ref,
        ],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;

    tracing::debug!(
        seq,
        kind = record.kind().as_str(),
        channel = record.channel(),
        "appended broadcast log record"
    );

    Ok(LogEntry {
        seq,
        emitted_at,
        record: record.clone(),
    })
}

/// Returns the sequence number of the newest entry, or 0 for an empty log.
///
/// # Errors
///
/// Returns `LogError::Database` on SQL failure.
pub fn latest_seq(conn: &Connection) -> Result<i64, LogError> {
    let max_seq: Option<i64> =
        conn.query_row("SELECT MAX(seq) FROM broadcast_log", [], |row| row.get(0))?;
    Ok(max_seq.unwrap_or(0))
}

/// Filter criteria for reading the broadcast log.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Only entries with `seq` strictly greater than this cursor.
    pub after_seq: Option<i64>,
    /// Only entries emitted for this channel.
    pub channel: Option<ChannelIndex>,
    /// Only targeted entries addressed to this actor.
    pub recipient: Option<ActorId>,
    /// Only entries of this shape.
    pub kind: Option<NotificationKind>,
    /// Maximum number of entries (default [`DEFAULT_QUERY_LIMIT`], clamped
    /// to `1..=MAX_QUERY_LIMIT`).
    pub limit: Option<i64>,
}

/// Reads the broadcast log in ascending `seq` order.
///
/// # Errors
///
/// Returns `LogError::Database` on SQL failure or if a stored row cannot be
/// decoded.
pub fn query_log(conn: &Connection, filter: &LogFilter) -> Result<Vec<LogEntry>, LogError> {
    // WHERE clauses and bind values are collected separately so that no
    // caller input is interpolated into the SQL text.
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
    if let Some(ref recipient) = filter.recipient {
        values.push(Box::new(recipient.as_str().to_string()));
        clauses.push(format!("recipient_id = ?{}", values.len()));
    }
    if let Some(kind) = filter.kind {
        values.push(Box::new(kind.as_str()));
        clauses.push(format!("kind = ?{}", values.len()));
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
        "SELECT {SELECT_COLUMNS} FROM broadcast_log {where_clause} ORDER BY seq ASC LIMIT ?{limit_idx}"
    );

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| &**v).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), map_row_to_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn map_row_to_entry(row: &Row) -> rusqlite::Result<LogEntry> {
    let kind_str: String = row.get(1)?;
    let kind: NotificationKind = kind_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let channel: ChannelIndex = row.get(2)?;
    let sender = ActorId::new(row.get::<_, String>(3)?);
    let recipient: Option<String> = row.get(4)?;
    let content = NotificationContent {
        title: row.get(6)?,
        action: row.get(7)?,
        body: row.get(8)?,
        image_ref: row.get(9)?,
    };

    let record = match (kind, recipient) {
        (NotificationKind::Targeted, Some(recipient)) => NotificationRecord::Targeted {
            channel,
            sender,
            recipient: ActorId::new(recipient),
            is_private: row.get(5)?,
            content,
        },
        (NotificationKind::Broadcast, None) => NotificationRecord::Broadcast {
            channel,
            sender,
            content,
        },
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                4,
                "recipient_id".to_string(),
                rusqlite::types::Type::Null,
            ))
        }
    };

    Ok(LogEntry {
        seq: row.get(0)?,
        emitted_at: row.get(10)?,
        record,
    })
}
