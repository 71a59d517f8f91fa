//! Shared types and limits for the Herald notification registry.
//!
//! Every Herald crate takes its cross-cutting vocabulary from here: the
//! opaque actor identifier, the stable channel index, and the content block
//! carried by each notification. Nothing in this crate touches storage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable, dense position of a channel in the channel store.
///
/// Indices are assigned `0, 1, 2, …` at creation and never reused.
pub type ChannelIndex = u32;

/// Maximum byte length accepted for an actor identifier.
pub const MAX_ACTOR_ID_LEN: usize = 256;

/// Maximum byte length of a per-user notification settings string.
pub const MAX_NOTIF_SETTINGS_LEN: usize = 100;

/// Opaque, globally unique participant identifier (an address).
///
/// The registry never interprets the contents; two actors are the same
/// participant exactly when their identifiers compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Wraps an identifier without validation.
    ///
    /// Use [`str::parse`] at trust boundaries instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error returned when an actor identifier fails boundary validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseActorIdError {
    #[error("actor id is empty")]
    Empty,
    #[error("actor id exceeds {MAX_ACTOR_ID_LEN} bytes")]
    TooLong,
    #[error("actor id contains whitespace or control characters")]
    InvalidCharacter,
}

impl FromStr for ActorId {
    type Err = ParseActorIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseActorIdError::Empty);
        }
        if s.len() > MAX_ACTOR_ID_LEN {
            return Err(ParseActorIdError::TooLong);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ParseActorIdError::InvalidCharacter);
        }
        Ok(Self(s.to_string()))
    }
}

/// The four caller-supplied fields of a notification.
///
/// For private notifications these are ciphertext produced by the sender
/// with the recipient's registered public key. The dispatcher passes them
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationContent {
    pub title: String,
    pub action: String,
    pub body: String,
    pub image_ref: String,
}

/// Shape of a broadcast log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Addressed to a single subscriber; may be private.
    #[serde(rename = "TARGETED")]
    Targeted,
    /// Addressed to every subscriber of the channel; always public.
    #[serde(rename = "BROADCAST")]
    Broadcast,
}

impl NotificationKind {
    /// Returns the canonical string label stored in the log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Targeted => "TARGETED",
            Self::Broadcast => "BROADCAST",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = ParseNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TARGETED" => Ok(Self::Targeted),
            "BROADCAST" => Ok(Self::Broadcast),
            _ => Err(ParseNotificationKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown notification kind label.
#[derive(Debug, Clone, Error)]
#[error("unknown notification kind: {0}")]
pub struct ParseNotificationKindError(pub String);
