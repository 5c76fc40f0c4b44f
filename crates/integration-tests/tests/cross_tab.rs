//! Cross-tab propagation over the shared persistent store.
//!
//! Two session stores attached to the same backing storage, each with its
//! replay loop running, model two tabs of the same origin. State written
//! in one tab must appear in the other without any network call, and a
//! replayed logout must not re-broadcast (no ping-pong).

mod common;

use std::time::Duration;

use souk_core::{IdentityRecord, Role, storage_keys};
use souk_session::storage::PersistentStore;

use common::{Tab, customer};

const WAIT: Duration = Duration::from_secs(5);

/// Await the next change on a watch receiver, with a hang guard.
async fn next_change<T: Clone>(rx: &mut tokio::sync::watch::Receiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.changed())
        .await
        .expect("timed out waiting for cross-tab change")
        .expect("watch closed");
    rx.borrow().clone()
}

fn two_tabs() -> (Tab, Tab) {
    let tab_a = Tab::new("t1");
    let tab_b = Tab::over(tab_a.storage.attach(), "t1");
    tab_a.session.spawn_replay();
    tab_b.session.spawn_replay();
    (tab_a, tab_b)
}

#[tokio::test]
async fn login_in_tab_a_appears_in_tab_b() {
    let (tab_a, tab_b) = two_tabs();
    let mut slot_b = tab_b.session.subscribe(Role::Customer);

    tab_a
        .session
        .set(customer("a@b.com", "Amira"))
        .expect("login");

    let record = next_change(&mut slot_b).await.expect("slot populated");
    assert_eq!(record.email().as_str(), "a@b.com");
    // No network call was involved: tab B's transport never ran.
    assert_eq!(tab_b.transport.seen(), 0);
}

#[tokio::test]
async fn logout_in_tab_a_clears_tab_b_without_ping_pong() {
    let (tab_a, tab_b) = two_tabs();
    let mut slot_b = tab_b.session.subscribe(Role::Customer);

    tab_a
        .session
        .set(customer("a@b.com", "Amira"))
        .expect("login");
    assert!(next_change(&mut slot_b).await.is_some());

    // A third observer records raw writes so re-broadcasts are visible.
    let observer = tab_a.storage.attach();
    let mut observed = observer.changes();

    tab_a.session.logout_all(true).expect("logout");
    assert_eq!(next_change(&mut slot_b).await, None);

    // Give tab B's replay loop time to misbehave if it were going to.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut logout_writes = 0;
    while let Ok(change) = observed.try_recv() {
        if change.key == storage_keys::LOGOUT_EVENT && change.new_value.is_some() {
            logout_writes += 1;
        }
    }
    assert_eq!(logout_writes, 1, "replayed logout must not re-broadcast");

    // Both tabs fully cleared.
    for role in Role::ALL {
        assert_eq!(tab_a.session.get(role), None);
        assert_eq!(tab_b.session.get(role), None);
    }
}

#[tokio::test]
async fn cart_update_in_tab_a_reconciles_tab_b() {
    let (tab_a, tab_b) = two_tabs();
    let mut slot_b = tab_b.session.subscribe(Role::Customer);

    tab_a
        .session
        .set(customer("a@b.com", "Amira"))
        .expect("login");
    assert!(next_change(&mut slot_b).await.is_some());

    let mut count_b = tab_b.session.cart_count();
    tab_a
        .session
        .broadcast_cart_update(vec!["p-1".to_owned(), "p-2".to_owned()])
        .expect("cart update");

    assert_eq!(next_change(&mut count_b).await, 2);

    // Tab B's held record was patched in place.
    let Some(IdentityRecord::Customer(profile)) = tab_b.session.get(Role::Customer) else {
        panic!("customer still logged in");
    };
    assert_eq!(profile.cart_item_ids, vec!["p-1", "p-2"]);
}

#[tokio::test]
async fn wishlist_update_in_tab_a_reconciles_tab_b() {
    let (tab_a, tab_b) = two_tabs();
    let mut slot_b = tab_b.session.subscribe(Role::Customer);

    tab_a
        .session
        .set(customer("a@b.com", "Amira"))
        .expect("login");
    assert!(next_change(&mut slot_b).await.is_some());

    let mut count_b = tab_b.session.wishlist_count();
    tab_a
        .session
        .broadcast_wishlist_update(vec!["p-9".to_owned()])
        .expect("wishlist update");

    assert_eq!(next_change(&mut count_b).await, 1);
}

#[tokio::test]
async fn renewed_credential_in_tab_a_reaches_tab_b_storage() {
    // A renewal persists both token and identity; tab B can read the
    // fresh token from the shared store for its own next request.
    let (tab_a, tab_b) = two_tabs();
    let mut slot_b = tab_b.session.subscribe(Role::Customer);

    tab_a.login("t2", customer("a@b.com", "Amira"));
    assert!(next_change(&mut slot_b).await.is_some());

    assert_eq!(tab_b.session.token(), Some("t2".to_owned()));
}

#[tokio::test]
async fn foreign_keys_are_ignored_by_the_replay_loop() {
    let (tab_a, tab_b) = two_tabs();

    // Unrelated writes on the shared store must not disturb session state.
    tab_a
        .storage
        .set("theme_preference", "dark")
        .expect("write");
    tokio::time::sleep(Duration::from_millis(20)).await;

    for role in Role::ALL {
        assert_eq!(tab_b.session.get(role), None);
    }
}
