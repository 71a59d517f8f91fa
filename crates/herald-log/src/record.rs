//! Notification record and log entry types.

use herald_types::{ActorId, ChannelIndex, NotificationContent, NotificationKind};
use serde::{Deserialize, Serialize};

/// A notification accepted by the dispatcher.
///
/// The content fields are stored exactly as the sender supplied them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationRecord {
    /// A notification for one subscriber of the channel.
    Targeted {
        channel: ChannelIndex,
        sender: ActorId,
        recipient: ActorId,
        /// Set when the content is ciphertext for `recipient`.
        is_private: bool,
        #[serde(flatten)]
        content: NotificationContent,
    },

    /// A notification for every subscriber of the channel.
    Broadcast {
        channel: ChannelIndex,
        sender: ActorId,
        #[serde(flatten)]
        content: NotificationContent,
    },
}

impl NotificationRecord {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Targeted { .. } => NotificationKind::Targeted,
            Self::Broadcast { .. } => NotificationKind::Broadcast,
        }
    }

    pub fn channel(&self) -> ChannelIndex {
        match self {
            Self::Targeted { channel, .. } | Self::Broadcast { channel, .. } => *channel,
        }
    }

    pub fn sender(&self) -> &ActorId {
        match self {
            Self::Targeted { sender, .. } | Self::Broadcast { sender, .. } => sender,
        }
    }

    /// The addressed recipient, for targeted records only.
    pub fn recipient(&self) -> Option<&ActorId> {
        match self {
            Self::Targeted { recipient, .. } => Some(recipient),
            Self::Broadcast { .. } => None,
        }
    }

    /// Broadcast records are always public.
    pub fn is_private(&self) -> bool {
        match self {
            Self::Targeted { is_private, .. } => *is_private,
            Self::Broadcast { .. } => false,
        }
    }

    pub fn content(&self) -> &NotificationContent {
        match self {
            Self::Targeted { content, .. } | Self::Broadcast { content, .. } => content,
        }
    }
}

/// A committed row of the `broadcast_log` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the log; strictly increasing, never reused.
    pub seq: i64,
    /// ISO 8601 timestamp assigned at append time.
    pub emitted_at: String,
    #[serde(flatten)]
    pub record: NotificationRecord,
}
