//! Persistent key/value storage shared by every tab of the same origin.
//!
//! [`PersistentStore`] abstracts the platform's durable storage primitive:
//! a flat string key/value space that survives reloads, is visible to every
//! tab, and notifies *other* tabs of each write. The one contract every
//! implementation must honor is that a handle never observes its own
//! writes; the cross-tab broadcaster relies on it to avoid message
//! ping-pong between tabs.
//!
//! [`MemoryStore`] is the in-process implementation: any number of handles
//! (one per simulated tab) share one backing map. It is what the tests run
//! against and the reference for the change-feed semantics a platform
//! adapter has to reproduce.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the persistent store backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend rejected the operation (quota, detached handle, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One observed write (or deletion) made by another tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// The key that changed.
    pub key: String,
    /// The new value, or `None` for a deletion.
    pub new_value: Option<String>,
}

/// The durable, cross-tab key/value storage primitive.
///
/// Operations are synchronous (the platform primitive is); values are
/// opaque strings, serialization happens above this seam.
pub trait PersistentStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend rejects the deletion.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to writes made by *other* handles over the same backing
    /// store. This handle's own writes are never delivered here.
    fn changes(&self) -> mpsc::UnboundedReceiver<StorageChange>;
}

/// In-process [`PersistentStore`] shared by any number of tab handles.
///
/// [`MemoryStore::attach`] creates a sibling handle over the same backing
/// map, modeling a second tab of the same origin. Cloning a handle keeps
/// its tab id: a clone is the same tab, not a new one.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    tab: u64,
}

struct Shared {
    data: Mutex<HashMap<String, String>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_tab: AtomicU64,
}

struct Subscriber {
    tab: u64,
    tx: mpsc::UnboundedSender<StorageChange>,
}

impl MemoryStore {
    /// Create a fresh store with one attached handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                data: Mutex::new(HashMap::new()),
                subscribers: Mutex::new(Vec::new()),
                next_tab: AtomicU64::new(1),
            }),
            tab: 0,
        }
    }

    /// Attach another handle (another "tab") to the same backing map.
    #[must_use]
    pub fn attach(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            tab: self.shared.next_tab.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Notify every subscribed handle except the writer, pruning
    /// subscribers whose receiver has been dropped.
    fn notify(&self, key: &str, new_value: Option<&str>) {
        let change = StorageChange {
            key: key.to_owned(),
            new_value: new_value.map(str::to_owned),
        };
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|subscriber| {
            if subscriber.tab == self.tab {
                return true;
            }
            subscriber.tx.send(change.clone()).is_ok()
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.shared.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.shared
            .data
            .lock()
            .insert(key.to_owned(), value.to_owned());
        self.notify(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.shared.data.lock().remove(key);
        // Deleting an absent key fires no change, matching the platform
        // primitive: storage events only fire for actual mutations.
        if removed.is_some() {
            self.notify(key, None);
        }
        Ok(())
    }

    fn changes(&self) -> mpsc::UnboundedReceiver<StorageChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .push(Subscriber { tab: self.tab, tx });
        rx
    }
}
