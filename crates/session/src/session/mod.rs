//! The authoritative session store.
//!
//! Single source of truth for "who is logged in": three mutually-exclusive
//! identity slots (customer / vendor / admin), derived cart and wishlist
//! counts for the customer slot, persistence of every write to the shared
//! store, and replay of other tabs' writes into this tab's reactive
//! streams.
//!
//! The store is an explicitly constructed, cheaply cloneable handle — one
//! per application instance, injected wherever identity is read or
//! written. Slots are only ever mutated through the setters here; callers
//! never reach into the watch channels to write.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

use souk_core::{
    BroadcastMessage, Credential, IdentityHint, IdentityRecord, Role, logical_clock_now,
    storage_keys,
};

use crate::broadcast::TabBroadcaster;
use crate::storage::{PersistentStore, StorageError};

/// Errors from session-store operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The persistent store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A session record could not be encoded for persistence.
    #[error("failed to encode session state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Last-applied logical clocks, one per timestamped message kind.
///
/// A replayed message at or before the recorded clock is stale and must be
/// ignored (defense against out-of-order delivery across tabs).
#[derive(Debug, Default)]
struct AppliedClocks {
    cart: i64,
    wishlist: i64,
    logout: i64,
}

/// The authoritative, reactive session store.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: Arc<dyn PersistentStore>,
    broadcaster: TabBroadcaster,
    customer: watch::Sender<Option<IdentityRecord>>,
    vendor: watch::Sender<Option<IdentityRecord>>,
    admin: watch::Sender<Option<IdentityRecord>>,
    cart_count: watch::Sender<usize>,
    wishlist_count: watch::Sender<usize>,
    applied: Mutex<AppliedClocks>,
}

impl SessionStore {
    /// Create a store over one tab's handle to the shared persistent store.
    #[must_use]
    pub fn new(storage: Arc<dyn PersistentStore>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                broadcaster: TabBroadcaster::new(Arc::clone(&storage)),
                storage,
                customer: watch::Sender::new(None),
                vendor: watch::Sender::new(None),
                admin: watch::Sender::new(None),
                cart_count: watch::Sender::new(0),
                wishlist_count: watch::Sender::new(0),
                applied: Mutex::new(AppliedClocks::default()),
            }),
        }
    }

    fn slot(&self, role: Role) -> &watch::Sender<Option<IdentityRecord>> {
        match role {
            Role::Customer => &self.inner.customer,
            Role::Vendor => &self.inner.vendor,
            Role::Admin => &self.inner.admin,
        }
    }

    // =========================================================================
    // Slot reads and reactive streams
    // =========================================================================

    /// The identity currently held in `role`'s slot.
    #[must_use]
    pub fn get(&self, role: Role) -> Option<IdentityRecord> {
        self.slot(role).borrow().clone()
    }

    /// Subscribe to `role`'s slot. The receiver observes every subsequent
    /// change, whether originated locally or replayed from another tab.
    #[must_use]
    pub fn subscribe(&self, role: Role) -> watch::Receiver<Option<IdentityRecord>> {
        self.slot(role).subscribe()
    }

    /// Subscribe to the derived cart item count.
    #[must_use]
    pub fn cart_count(&self) -> watch::Receiver<usize> {
        self.inner.cart_count.subscribe()
    }

    /// Subscribe to the derived wishlist item count.
    #[must_use]
    pub fn wishlist_count(&self) -> watch::Receiver<usize> {
        self.inner.wishlist_count.subscribe()
    }

    // =========================================================================
    // Slot writes
    // =========================================================================

    /// Log an identity into its slot: persist the record to the shared
    /// store (which is what other tabs observe) and publish it locally.
    ///
    /// Precondition (caller discipline, not enforced here): at most one
    /// role is logged in at a time.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the record cannot be persisted.
    pub fn set(&self, record: IdentityRecord) -> Result<(), SessionError> {
        let role = record.role();
        let encoded = serde_json::to_string(&record)?;
        self.inner.storage.set(role.storage_key(), &encoded)?;

        if let IdentityRecord::Customer(profile) = &record {
            self.inner
                .cart_count
                .send_replace(profile.cart_item_ids.len());
            self.inner
                .wishlist_count
                .send_replace(profile.wishlist_item_ids.len());
        }

        self.slot(role).send_replace(Some(record));
        Ok(())
    }

    /// Empty `role`'s slot locally without touching the persisted record.
    ///
    /// This is a transient, single-tab sign-out: only [`Self::logout_all`]
    /// deletes persisted state. The asymmetry with [`Self::set`] (which
    /// does persist) is intentional and covered by a regression test.
    pub fn clear(&self, role: Role) {
        self.slot(role).send_replace(None);
    }

    /// Persist a renewed credential and the identity it authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the token or record cannot be persisted.
    pub fn set_credential(&self, credential: &Credential) -> Result<(), SessionError> {
        self.inner
            .storage
            .set(storage_keys::JWT, &credential.token)?;
        self.set(credential.identity.clone())
    }

    /// End the session everywhere: clear all slots, all derived counts,
    /// and every persisted session key; when `broadcast` is set, publish a
    /// logout message so other tabs observe it.
    ///
    /// Replayed logouts call this with `broadcast = false` — re-publishing
    /// would ping-pong the message between tabs indefinitely.
    ///
    /// Idempotent: logging out an already-empty session re-writes empty
    /// state and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the persistent store rejects a deletion.
    pub fn logout_all(&self, broadcast: bool) -> Result<(), SessionError> {
        for role in Role::ALL {
            self.slot(role).send_replace(None);
        }
        self.inner.cart_count.send_replace(0);
        self.inner.wishlist_count.send_replace(0);

        for key in storage_keys::ALL_SESSION_KEYS {
            self.inner.storage.remove(key)?;
        }

        if broadcast {
            let timestamp = logical_clock_now();
            self.inner.applied.lock().logout = timestamp;
            self.inner
                .broadcaster
                .publish(&BroadcastMessage::LoggedOut { timestamp })?;
            tracing::info!("session logged out, broadcast to other tabs");
        } else {
            tracing::info!("session logged out locally");
        }
        Ok(())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load the persisted identity at application start.
    ///
    /// Probes the identity keys in fixed precedence order (customer, then
    /// vendor, then admin) and loads **only the first** record found —
    /// slots are mutually exclusive, so two persisted roles mean stale
    /// state and the later one is left untouched. Corrupt entries are
    /// deleted and skipped; that is a local recovery, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] only for storage backend failures.
    pub fn load_from_persistent_store(&self) -> Result<Option<Role>, SessionError> {
        for role in Role::ALL {
            let Some(raw) = self.inner.storage.get(role.storage_key())? else {
                continue;
            };
            match serde_json::from_str::<IdentityRecord>(&raw) {
                Ok(record) => {
                    if let IdentityRecord::Customer(profile) = &record {
                        self.inner
                            .cart_count
                            .send_replace(profile.cart_item_ids.len());
                        self.inner
                            .wishlist_count
                            .send_replace(profile.wishlist_item_ids.len());
                    }
                    self.slot(role).send_replace(Some(record));
                    tracing::debug!(%role, "restored persisted identity");
                    return Ok(Some(role));
                }
                Err(error) => {
                    tracing::warn!(%role, %error, "deleting corrupt persisted identity");
                    self.inner.storage.remove(role.storage_key())?;
                }
            }
        }
        Ok(None)
    }

    /// The current bearer token, if any.
    ///
    /// Falls back through the legacy token keys and then the per-role
    /// credential blobs; first non-empty match wins. Backend read errors
    /// are treated as "no token" — attaching nothing and letting the
    /// server reject the call beats failing the request up front.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        for key in storage_keys::TOKEN_FALLBACK_KEYS {
            match self.inner.storage.get(key) {
                Ok(Some(token)) if !token.is_empty() => return Some(token),
                Ok(_) => {}
                Err(error) => tracing::warn!(%key, %error, "token lookup failed"),
            }
        }
        for role in Role::ALL {
            if let Some(credential) = self.read_credential_blob(role)
                && !credential.token.is_empty()
            {
                return Some(credential.token);
            }
        }
        None
    }

    /// The last-known `{email, role}` hint, read from *persisted* state.
    ///
    /// The coordinator seeds the re-authentication prompt from here rather
    /// than from the in-memory slots, which may already be stale by the
    /// time an expiry surfaces.
    #[must_use]
    pub fn persisted_hint(&self) -> Option<IdentityHint> {
        for role in Role::ALL {
            let raw = match self.inner.storage.get(role.storage_key()) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(error) => {
                    tracing::warn!(%role, %error, "hint lookup failed");
                    continue;
                }
            };
            if let Ok(record) = serde_json::from_str::<IdentityRecord>(&raw) {
                return Some(record.hint());
            }
        }
        // Older clients persisted only the per-role credential blob.
        for role in Role::ALL {
            if let Some(credential) = self.read_credential_blob(role) {
                return Some(credential.identity.hint());
            }
        }
        None
    }

    fn read_credential_blob(&self, role: Role) -> Option<Credential> {
        let raw = self.inner.storage.get(role.data_key()).ok()??;
        serde_json::from_str(&raw).ok()
    }

    // =========================================================================
    // Derived-count broadcasts
    // =========================================================================

    /// Record new cart contents: update the derived count, embed the id
    /// list into the held customer record, persist it, and publish a cart
    /// message so other tabs reconcile their copy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the record or message cannot be
    /// persisted.
    pub fn broadcast_cart_update(&self, item_ids: Vec<String>) -> Result<(), SessionError> {
        self.broadcast_list_update(item_ids, ListKind::Cart)
    }

    /// Record new wishlist contents; see [`Self::broadcast_cart_update`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the record or message cannot be
    /// persisted.
    pub fn broadcast_wishlist_update(&self, item_ids: Vec<String>) -> Result<(), SessionError> {
        self.broadcast_list_update(item_ids, ListKind::Wishlist)
    }

    fn broadcast_list_update(
        &self,
        item_ids: Vec<String>,
        kind: ListKind,
    ) -> Result<(), SessionError> {
        let count = item_ids.len();
        let counter = match kind {
            ListKind::Cart => &self.inner.cart_count,
            ListKind::Wishlist => &self.inner.wishlist_count,
        };
        counter.send_replace(count);

        // Embed the list into the held customer record and persist it so a
        // reload (in any tab) comes back with the same contents.
        let patched = {
            let mut patched = None;
            self.inner.customer.send_if_modified(|slot| {
                let Some(IdentityRecord::Customer(profile)) = slot else {
                    return false;
                };
                match kind {
                    ListKind::Cart => profile.cart_item_ids = item_ids.clone(),
                    ListKind::Wishlist => profile.wishlist_item_ids = item_ids.clone(),
                }
                patched = Some(IdentityRecord::Customer(profile.clone()));
                true
            });
            patched
        };
        if let Some(record) = patched {
            let encoded = serde_json::to_string(&record)?;
            self.inner
                .storage
                .set(Role::Customer.storage_key(), &encoded)?;
        }

        let timestamp = logical_clock_now();
        {
            let mut applied = self.inner.applied.lock();
            match kind {
                ListKind::Cart => applied.cart = timestamp,
                ListKind::Wishlist => applied.wishlist = timestamp,
            }
        }
        let message = match kind {
            ListKind::Cart => BroadcastMessage::CartChanged {
                item_ids,
                count,
                timestamp,
            },
            ListKind::Wishlist => BroadcastMessage::WishlistChanged {
                item_ids,
                count,
                timestamp,
            },
        };
        self.inner.broadcaster.publish(&message)?;
        Ok(())
    }

    // =========================================================================
    // Cross-tab replay
    // =========================================================================

    /// Spawn the replay loop: every write another tab makes to the shared
    /// store is decoded and applied to this store's streams. Runs until
    /// the storage handle's change feed closes.
    pub fn spawn_replay(&self) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let mut changes = store.inner.broadcaster.changes();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                if let Some(message) = TabBroadcaster::decode(&change) {
                    store.apply_remote(message);
                }
            }
        })
    }

    /// Apply one message observed from another tab.
    ///
    /// Identity changes republish to the slot but never re-persist (the
    /// writing tab already did); a replayed logout clears locally without
    /// re-broadcasting; list updates pass the per-kind staleness check,
    /// update the count, and patch the held customer record in place.
    pub fn apply_remote(&self, message: BroadcastMessage) {
        match message {
            BroadcastMessage::IdentityChanged { role, record, .. } => {
                tracing::debug!(%role, present = record.is_some(), "replaying identity change");
                if let Some(IdentityRecord::Customer(profile)) = &record {
                    self.inner
                        .cart_count
                        .send_replace(profile.cart_item_ids.len());
                    self.inner
                        .wishlist_count
                        .send_replace(profile.wishlist_item_ids.len());
                }
                self.slot(role).send_replace(record);
            }
            BroadcastMessage::LoggedOut { timestamp } => {
                {
                    let mut applied = self.inner.applied.lock();
                    if timestamp <= applied.logout {
                        tracing::debug!(timestamp, "ignoring stale logout message");
                        return;
                    }
                    applied.logout = timestamp;
                }
                if let Err(error) = self.logout_all(false) {
                    tracing::warn!(%error, "failed to apply replayed logout");
                }
            }
            BroadcastMessage::CartChanged {
                item_ids,
                count,
                timestamp,
            } => self.apply_remote_list_update(item_ids, count, timestamp, ListKind::Cart),
            BroadcastMessage::WishlistChanged {
                item_ids,
                count,
                timestamp,
            } => self.apply_remote_list_update(item_ids, count, timestamp, ListKind::Wishlist),
        }
    }

    fn apply_remote_list_update(
        &self,
        item_ids: Vec<String>,
        count: usize,
        timestamp: i64,
        kind: ListKind,
    ) {
        {
            let mut applied = self.inner.applied.lock();
            let clock = match kind {
                ListKind::Cart => &mut applied.cart,
                ListKind::Wishlist => &mut applied.wishlist,
            };
            if timestamp <= *clock {
                tracing::debug!(timestamp, ?kind, "ignoring stale list update");
                return;
            }
            *clock = timestamp;
        }

        let counter = match kind {
            ListKind::Cart => &self.inner.cart_count,
            ListKind::Wishlist => &self.inner.wishlist_count,
        };
        counter.send_replace(count);

        // Patch the held customer record so bound views refresh; no
        // re-persist, the writing tab's copy is already in the store.
        self.inner.customer.send_if_modified(|slot| {
            let Some(IdentityRecord::Customer(profile)) = slot else {
                return false;
            };
            match kind {
                ListKind::Cart => profile.cart_item_ids = item_ids.clone(),
                ListKind::Wishlist => profile.wishlist_item_ids = item_ids.clone(),
            }
            true
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Cart,
    Wishlist,
}
