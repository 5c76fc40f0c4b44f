//! Cross-tab broadcast messages.
//!
//! The message shapes carried over the persistent store's change feed.
//! Every message is tagged with a millisecond logical clock; consumers must
//! ignore a message whose timestamp is not newer than the last applied
//! message of the same kind. The underlying store delivers per-key writes
//! in order, so the clock is a defense against platform-level reordering,
//! not something the bus relies on end-to-end.

use serde::{Deserialize, Serialize};

use crate::types::identity::{IdentityRecord, Role};

/// A message published to every other tab of the same origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    /// One identity slot changed (login, profile refresh, or sign-out of
    /// that slot when `record` is `None`).
    IdentityChanged {
        role: Role,
        record: Option<IdentityRecord>,
        timestamp: i64,
    },
    /// The session ended everywhere; receivers clear without re-publishing.
    LoggedOut { timestamp: i64 },
    /// The customer's cart contents changed.
    CartChanged {
        item_ids: Vec<String>,
        count: usize,
        timestamp: i64,
    },
    /// The customer's wishlist contents changed.
    WishlistChanged {
        item_ids: Vec<String>,
        count: usize,
        timestamp: i64,
    },
}

impl BroadcastMessage {
    /// The logical clock this message was published at.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        match self {
            Self::IdentityChanged { timestamp, .. }
            | Self::LoggedOut { timestamp }
            | Self::CartChanged { timestamp, .. }
            | Self::WishlistChanged { timestamp, .. } => *timestamp,
        }
    }
}

/// Current value of the millisecond logical clock.
#[must_use]
pub fn logical_clock_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
