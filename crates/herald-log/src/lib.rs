//! Append-only broadcast log for Herald.
//!
//! The broadcast log is the only output of the notification dispatcher:
//! every successful send appends exactly one [`NotificationRecord`], and the
//! delivery pipeline downstream reads the log in `seq` order to render and
//! deliver alerts. The registry never reads its own log back.
//!
//! # Record shapes
//!
//! | Kind | Fields |
//! |------|--------|
//! | `TARGETED` | channel, sender, recipient, private flag, content |
//! | `BROADCAST` | channel, sender, content |
//!
//! # Usage
//!
//! ```rust,ignore
//! use herald_log::{append_record, NotificationRecord};
//!
//! let entry = append_record(&tx, &NotificationRecord::Broadcast {
//!     channel: 0,
//!     sender: admin.clone(),
//!     content,
//! })?;
//! ```
//!
//! Appends are plain inserts; callers run them inside the same transaction
//! as the validation that authorized them, so a rolled-back call leaves no
//! entry behind.

mod error;
mod record;
mod store;

pub use error::LogError;
pub use record::{LogEntry, NotificationRecord};
pub use store::{append_record, latest_seq, query_log, LogFilter, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
