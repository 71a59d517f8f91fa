//! Channel registry and notification dispatch for Herald.
//!
//! This crate is the authority over who may do what to a channel:
//!
//! - the **channel store** (create, edit, read),
//! - the **subscription ledger** (subscribe, unsubscribe, subscriber sets),
//! - the **push-access ledger** (admin grants of public sending rights),
//! - the **public key registry** (self-declared keys for private payloads),
//! - the **dispatcher**, which validates a send and appends exactly one
//!   record to the broadcast log,
//! - the **registry event feed**, one entry per committed state change,
//!   kept apart from the broadcast log.
//!
//! Every state-changing function runs its validation and its writes inside
//! one [`herald_db::run_atomic`] transaction. A function that returns `Err`
//! has changed nothing, and in particular has appended nothing to the log.
//! Reads that issue more than one SELECT run inside [`herald_db::run_read`],
//! so each sees a single committed state.
//!
//! # Trust model
//!
//! | Operation | Who may call it |
//! |-----------|-----------------|
//! | `edit_channel`, `set_push_access` | channel admin |
//! | `notify_one` with `is_private` | channel admin only |
//! | `notify_one` public, `notify_all` | admin or push-access holder |
//! | everything else | any caller, acting for itself |
//!
//! Authorization is the combination of two predicates, [`is_admin`] and
//! [`has_push_access`], evaluated at each call site.

mod access;
mod dispatch;
mod error;
mod events;
mod keys;
mod settings;
mod store;
mod subscription;

pub use access::{has_push_access, is_admin, set_push_access};
pub use dispatch::{notify_all, notify_one};
pub use error::ChannelError;
pub use events::{registry_events, RegistryEvent, RegistryEventEntry, RegistryEventFilter};
pub use keys::{get_public_key, set_public_key};
pub use settings::{get_notification_settings, set_notification_settings};
pub use store::{all_channels, create_channel, edit_channel, get_channel, Channel, ChannelParams};
pub use subscription::{
    is_subscribed, subscribe, subscribers_count, subscribers_of, subscribers_with_count,
    subscriptions_of, unsubscribe, Subscribers,
};

#[cfg(test)]
mod tests;
