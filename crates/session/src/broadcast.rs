//! Cross-tab broadcaster.
//!
//! A thin message protocol layered on the persistent store's change feed.
//! Publishing writes a message onto its well-known key; every other tab
//! decodes the resulting [`StorageChange`] back into a
//! [`BroadcastMessage`]. The store's writer-exclusion contract is what
//! keeps a tab from replaying its own publications.
//!
//! The identity keys hold bare serialized records (stable contract shared
//! with older clients), so decoded `IdentityChanged` messages are stamped
//! with the observation clock; the timestamped kinds (cart, wishlist,
//! logout) carry their own clock on the wire.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use souk_core::{BroadcastMessage, IdentityRecord, Role, logical_clock_now, storage_keys};

use crate::storage::{PersistentStore, StorageChange, StorageError};

/// Wire payload for the cart/wishlist update keys: `{count, items, timestamp}`.
#[derive(Debug, Serialize, Deserialize)]
struct ListUpdatePayload {
    count: usize,
    items: Vec<String>,
    timestamp: i64,
}

/// Publishes and decodes [`BroadcastMessage`]s over a [`PersistentStore`].
#[derive(Clone)]
pub struct TabBroadcaster {
    storage: Arc<dyn PersistentStore>,
}

impl TabBroadcaster {
    /// Create a broadcaster over the given store handle.
    #[must_use]
    pub fn new(storage: Arc<dyn PersistentStore>) -> Self {
        Self { storage }
    }

    /// Publish a message by writing its well-known key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store rejects the write.
    pub fn publish(&self, message: &BroadcastMessage) -> Result<(), StorageError> {
        match message {
            BroadcastMessage::IdentityChanged { role, record, .. } => match record {
                Some(record) => self
                    .storage
                    .set(role.storage_key(), &encode(record)),
                None => self.storage.remove(role.storage_key()),
            },
            BroadcastMessage::LoggedOut { timestamp } => self
                .storage
                .set(storage_keys::LOGOUT_EVENT, &timestamp.to_string()),
            BroadcastMessage::CartChanged {
                item_ids,
                count,
                timestamp,
            } => self.publish_list_update(storage_keys::CART_UPDATE, item_ids, *count, *timestamp),
            BroadcastMessage::WishlistChanged {
                item_ids,
                count,
                timestamp,
            } => {
                self.publish_list_update(storage_keys::WISHLIST_UPDATE, item_ids, *count, *timestamp)
            }
        }
    }

    /// Subscribe to the raw change feed of the backing store.
    ///
    /// The feed excludes this handle's own writes; run each change through
    /// [`TabBroadcaster::decode`] to recover messages.
    #[must_use]
    pub fn changes(&self) -> mpsc::UnboundedReceiver<StorageChange> {
        self.storage.changes()
    }

    /// Decode another tab's write back into a message.
    ///
    /// Unknown keys and corrupt payloads decode to `None`; corruption is
    /// logged but never surfaced, the bus simply drops the message.
    #[must_use]
    pub fn decode(change: &StorageChange) -> Option<BroadcastMessage> {
        if let Ok(role) = Role::from_str(&change.key) {
            let record = match &change.new_value {
                Some(raw) => Some(decode_record(&change.key, raw)?),
                None => None,
            };
            return Some(BroadcastMessage::IdentityChanged {
                role,
                record,
                timestamp: logical_clock_now(),
            });
        }

        match (change.key.as_str(), &change.new_value) {
            (storage_keys::LOGOUT_EVENT, Some(raw)) => {
                let timestamp = raw.parse().ok().or_else(|| {
                    tracing::warn!(value = %raw, "discarding malformed logout timestamp");
                    None
                })?;
                Some(BroadcastMessage::LoggedOut { timestamp })
            }
            (storage_keys::CART_UPDATE, Some(raw)) => {
                let payload = decode_list_update(&change.key, raw)?;
                Some(BroadcastMessage::CartChanged {
                    item_ids: payload.items,
                    count: payload.count,
                    timestamp: payload.timestamp,
                })
            }
            (storage_keys::WISHLIST_UPDATE, Some(raw)) => {
                let payload = decode_list_update(&change.key, raw)?;
                Some(BroadcastMessage::WishlistChanged {
                    item_ids: payload.items,
                    count: payload.count,
                    timestamp: payload.timestamp,
                })
            }
            _ => None,
        }
    }

    fn publish_list_update(
        &self,
        key: &str,
        item_ids: &[String],
        count: usize,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        let payload = ListUpdatePayload {
            count,
            items: item_ids.to_vec(),
            timestamp,
        };
        let encoded = serde_json::to_string(&payload)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.storage.set(key, &encoded)
    }
}

fn encode(record: &IdentityRecord) -> String {
    // IdentityRecord serialization cannot fail: plain structs, string keys.
    serde_json::to_string(record).unwrap_or_default()
}

fn decode_record(key: &str, raw: &str) -> Option<IdentityRecord> {
    match serde_json::from_str(raw) {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::warn!(%key, %error, "discarding corrupt identity payload");
            None
        }
    }
}

fn decode_list_update(key: &str, raw: &str) -> Option<ListUpdatePayload> {
    match serde_json::from_str(raw) {
        Ok(payload) => Some(payload),
        Err(error) => {
            tracing::warn!(%key, %error, "discarding corrupt list-update payload");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use souk_core::{CustomerId, CustomerProfile, Email};

    use crate::storage::MemoryStore;

    fn customer_record() -> IdentityRecord {
        IdentityRecord::Customer(CustomerProfile {
            id: CustomerId::generate(),
            email: Email::parse("a@b.com").unwrap(),
            display_name: "Amira".to_owned(),
            cart_item_ids: vec!["p-1".to_owned()],
            wishlist_item_ids: vec![],
        })
    }

    #[tokio::test]
    async fn test_identity_publish_round_trips_to_other_tab() {
        let tab_a = MemoryStore::new();
        let tab_b = tab_a.attach();
        let mut feed = tab_b.changes();

        let broadcaster = TabBroadcaster::new(Arc::new(tab_a));
        let record = customer_record();
        broadcaster
            .publish(&BroadcastMessage::IdentityChanged {
                role: Role::Customer,
                record: Some(record.clone()),
                timestamp: logical_clock_now(),
            })
            .unwrap();

        let change = feed.recv().await.unwrap();
        let Some(BroadcastMessage::IdentityChanged {
            role,
            record: decoded,
            ..
        }) = TabBroadcaster::decode(&change)
        else {
            panic!("expected identity message");
        };
        assert_eq!(role, Role::Customer);
        assert_eq!(decoded, Some(record));
    }

    #[tokio::test]
    async fn test_cart_update_round_trips() {
        let tab_a = MemoryStore::new();
        let tab_b = tab_a.attach();
        let mut feed = tab_b.changes();

        let broadcaster = TabBroadcaster::new(Arc::new(tab_a));
        broadcaster
            .publish(&BroadcastMessage::CartChanged {
                item_ids: vec!["p-1".to_owned(), "p-2".to_owned()],
                count: 2,
                timestamp: 99,
            })
            .unwrap();

        let change = feed.recv().await.unwrap();
        assert_eq!(
            TabBroadcaster::decode(&change),
            Some(BroadcastMessage::CartChanged {
                item_ids: vec!["p-1".to_owned(), "p-2".to_owned()],
                count: 2,
                timestamp: 99,
            })
        );
    }

    #[test]
    fn test_unknown_keys_decode_to_none() {
        let change = StorageChange {
            key: "theme_preference".to_owned(),
            new_value: Some("dark".to_owned()),
        };
        assert_eq!(TabBroadcaster::decode(&change), None);
    }

    #[test]
    fn test_corrupt_payloads_decode_to_none() {
        for (key, value) in [
            (storage_keys::CUSTOMER, "{not json"),
            (storage_keys::CART_UPDATE, "[]"),
            (storage_keys::LOGOUT_EVENT, "yesterday"),
        ] {
            let change = StorageChange {
                key: key.to_owned(),
                new_value: Some(value.to_owned()),
            };
            assert_eq!(TabBroadcaster::decode(&change), None, "key: {key}");
        }
    }

    #[test]
    fn test_identity_deletion_decodes_to_empty_slot() {
        let change = StorageChange {
            key: storage_keys::VENDOR.to_owned(),
            new_value: None,
        };
        let Some(BroadcastMessage::IdentityChanged { role, record, .. }) =
            TabBroadcaster::decode(&change)
        else {
            panic!("expected identity message");
        };
        assert_eq!(role, Role::Vendor);
        assert_eq!(record, None);
    }
}
