//! Error taxonomy for registry operations.

use herald_types::{ActorId, ChannelIndex};
use thiserror::Error;

/// Errors returned by channel registry operations.
///
/// Every variant aborts the whole operation; no partial state is written.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel index is out of range.
    #[error("channel not found: {0}")]
    NotFound(ChannelIndex),

    /// The caller lacks the privilege the operation requires.
    #[error("{actor} is not authorized to {action} on channel {channel}")]
    Unauthorized {
        actor: ActorId,
        channel: ChannelIndex,
        action: &'static str,
    },

    #[error("already subscribed to channel {0}")]
    AlreadySubscribed(ChannelIndex),

    #[error("not subscribed to channel {0}")]
    NotSubscribed(ChannelIndex),

    /// A targeted notification named a recipient outside the subscriber set.
    #[error("recipient {recipient} is not subscribed to channel {channel}")]
    RecipientNotSubscribed {
        recipient: ActorId,
        channel: ChannelIndex,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("broadcast log error: {0}")]
    Log(#[from] herald_log::LogError),

    /// A registry event payload failed to encode or decode.
    #[error("registry event payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ChannelError {
    pub(crate) fn unauthorized(actor: &ActorId, channel: ChannelIndex, action: &'static str) -> Self {
        tracing::warn!(actor = %actor, channel, action, "authorization denied");
        Self::Unauthorized {
            actor: actor.clone(),
            channel,
            action,
        }
    }
}
