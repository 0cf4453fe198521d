//! Synchronization store: the single source of truth for the active
//! family and its live grocery list.
//!
//! The store owns at most one live subscription per kind (families of
//! the current user, items of the active family) and keeps its
//! in-memory state in step with the snapshots they deliver. Teardown is
//! explicit, and a generation counter per kind guarantees that a
//! snapshot from an already-replaced subscription can never land in the
//! state ("last subscription wins"): every apply task captures the
//! generation current when its subscription was installed and discards
//! anything once the store has moved on.
//!
//! This is an explicit context object, not a module-level singleton:
//! construct it, `init` it, and `cleanup` when the session ends.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use crate::models::{Family, GroceryItem};
use crate::remote::{CollectionClient, RemoteError, Subscription, SubscriptionHandle};
use crate::repos::{decode_lossy, FamilyRepository, ItemRepository, FAMILIES, GROCERY_ITEMS};

/// Errors surfaced by the store itself.
///
/// Only subscription establishment and loss are reported here; write
/// failures belong to the repositories and pass through untouched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to subscribe to {collection}: {source}")]
    Subscribe {
        collection: &'static str,
        #[source]
        source: RemoteError,
    },
    #[error("live subscription to {collection} dropped")]
    SubscriptionDropped { collection: &'static str },
}

#[derive(Default)]
struct StoreState {
    families: Vec<Family>,
    items: Vec<GroceryItem>,
    active_family_id: Option<String>,
    family_sub: Option<SubscriptionHandle>,
    item_sub: Option<SubscriptionHandle>,
    /// Bumped whenever the family subscription is replaced or torn down
    family_gen: u64,
    /// Bumped whenever the item subscription is replaced or torn down
    item_gen: u64,
}

struct Inner {
    family_repo: FamilyRepository,
    item_repo: ItemRepository,
    state: Mutex<StoreState>,
    errors: mpsc::UnboundedSender<SyncError>,
    changed: watch::Sender<u64>,
}

/// Reactive store for one user session.
///
/// Cheap to clone; clones share state and subscriptions.
#[derive(Clone)]
pub struct SyncStore {
    inner: Arc<Inner>,
}

impl SyncStore {
    /// Create a store over a collection client. The returned receiver
    /// carries recoverable sync failures (a dropped subscription, a
    /// failed auto-activation); the UI shows these as dismissible
    /// notices.
    pub fn new(client: Arc<dyn CollectionClient>) -> (Self, mpsc::UnboundedReceiver<SyncError>) {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (changed_tx, _) = watch::channel(0);
        let store = Self {
            inner: Arc::new(Inner {
                family_repo: FamilyRepository::new(client.clone()),
                item_repo: ItemRepository::new(client),
                state: Mutex::new(StoreState::default()),
                errors: errors_tx,
                changed: changed_tx,
            }),
        };
        (store, errors_rx)
    }

    /// Start (or restart) the session for a user: replaces any prior
    /// family subscription with a live one on families owned by
    /// `owner_id`. When a snapshot arrives and no family is active yet,
    /// the first family in query order is activated automatically.
    ///
    /// On failure the previous subscription and all cached state are
    /// left as they were.
    pub async fn init(&self, owner_id: &str) -> Result<(), SyncError> {
        Inner::subscribe_families(&self.inner, owner_id).await
    }

    /// Make `family_id` the active family: replaces any prior item
    /// subscription (also when the id is unchanged) and records the new
    /// active id. Cached items are retained until the new
    /// subscription's first snapshot lands, so switching never blanks
    /// the list.
    pub async fn set_active_family(&self, family_id: &str) -> Result<(), SyncError> {
        Inner::subscribe_items(&self.inner, family_id).await
    }

    /// Tear down both subscriptions and reset all state to initial
    /// empty values. Safe to call any number of times.
    pub async fn cleanup(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(handle) = state.item_sub.take() {
            handle.cancel();
        }
        if let Some(handle) = state.family_sub.take() {
            handle.cancel();
        }
        // Invalidate any snapshot still in flight.
        state.family_gen += 1;
        state.item_gen += 1;
        state.families.clear();
        state.items.clear();
        state.active_family_id = None;
        drop(state);
        self.inner.changed.send_modify(|v| *v += 1);
        debug!("sync store cleaned up");
    }

    pub async fn families(&self) -> Vec<Family> {
        self.inner.state.lock().await.families.clone()
    }

    pub async fn items(&self) -> Vec<GroceryItem> {
        self.inner.state.lock().await.items.clone()
    }

    pub async fn active_family_id(&self) -> Option<String> {
        self.inner.state.lock().await.active_family_id.clone()
    }

    /// The active family's full record, if its snapshot has arrived.
    pub async fn active_family(&self) -> Option<Family> {
        let state = self.inner.state.lock().await;
        let id = state.active_family_id.as_deref()?;
        state.families.iter().find(|f| f.id == id).cloned()
    }

    /// A receiver that changes whenever store state changes; the view
    /// layer awaits it to re-render.
    pub fn watch_changes(&self) -> watch::Receiver<u64> {
        self.inner.changed.subscribe()
    }
}

impl Inner {
    async fn subscribe_families(inner: &Arc<Inner>, owner_id: &str) -> Result<(), SyncError> {
        // Subscribe before touching state: a failed attempt must leave
        // the prior subscription and cached data intact.
        let subscription = inner
            .family_repo
            .subscribe_by_owner(owner_id)
            .await
            .map_err(|source| SyncError::Subscribe {
                collection: FAMILIES,
                source,
            })?;

        let generation = {
            let mut state = inner.state.lock().await;
            if let Some(old) = state.family_sub.take() {
                old.cancel();
            }
            state.family_gen += 1;
            state.family_sub = Some(subscription.handle.clone());
            state.family_gen
        };

        debug!(owner_id = %owner_id, generation, "family subscription installed");
        tokio::spawn(Inner::apply_family_snapshots(
            Arc::clone(inner),
            subscription,
            generation,
        ));
        Ok(())
    }

    async fn subscribe_items(inner: &Arc<Inner>, family_id: &str) -> Result<(), SyncError> {
        let subscription = inner
            .item_repo
            .subscribe(family_id)
            .await
            .map_err(|source| SyncError::Subscribe {
                collection: GROCERY_ITEMS,
                source,
            })?;

        let generation = {
            let mut state = inner.state.lock().await;
            if let Some(old) = state.item_sub.take() {
                old.cancel();
            }
            state.item_gen += 1;
            state.item_sub = Some(subscription.handle.clone());
            state.active_family_id = Some(family_id.to_string());
            // Items from the previous family stay visible until the new
            // subscription's first snapshot replaces them.
            state.item_gen
        };

        inner.changed.send_modify(|v| *v += 1);
        debug!(family_id = %family_id, generation, "item subscription installed");
        tokio::spawn(Inner::apply_item_snapshots(
            Arc::clone(inner),
            subscription,
            generation,
        ));
        Ok(())
    }

    /// Activation initiated by the family apply task rather than the
    /// caller. Between reading the snapshot and installing the item
    /// subscription, `cleanup` or an explicit activation may have run;
    /// the subscription is only installed if the family generation is
    /// unchanged and no family became active in the meantime, and is
    /// cancelled otherwise.
    async fn auto_activate(
        inner: &Arc<Inner>,
        family_id: &str,
        family_generation: u64,
    ) -> Result<(), SyncError> {
        let subscription = inner
            .item_repo
            .subscribe(family_id)
            .await
            .map_err(|source| SyncError::Subscribe {
                collection: GROCERY_ITEMS,
                source,
            })?;

        let generation = {
            let mut state = inner.state.lock().await;
            if state.family_gen != family_generation || state.active_family_id.is_some() {
                subscription.handle.cancel();
                debug!(family_id = %family_id, "auto-activation superseded");
                return Ok(());
            }
            if let Some(old) = state.item_sub.take() {
                old.cancel();
            }
            state.item_gen += 1;
            state.item_sub = Some(subscription.handle.clone());
            state.active_family_id = Some(family_id.to_string());
            state.item_gen
        };

        inner.changed.send_modify(|v| *v += 1);
        debug!(family_id = %family_id, generation, "item subscription installed");
        tokio::spawn(Inner::apply_item_snapshots(
            Arc::clone(inner),
            subscription,
            generation,
        ));
        Ok(())
    }

    /// Applies family snapshots for one subscription generation.
    async fn apply_family_snapshots(
        inner: Arc<Inner>,
        mut subscription: Subscription,
        generation: u64,
    ) {
        while let Some(documents) = subscription.snapshots.recv().await {
            let activate = {
                let mut state = inner.state.lock().await;
                if state.family_gen != generation {
                    warn!(generation, "discarding stale family snapshot");
                    break;
                }
                state.families = decode_lossy(documents);
                debug!(count = state.families.len(), "family snapshot applied");
                match state.active_family_id {
                    None => state.families.first().map(|f| f.id.clone()),
                    Some(_) => None,
                }
            };
            inner.changed.send_modify(|v| *v += 1);

            if let Some(family_id) = activate {
                debug!(family_id = %family_id, "auto-activating first family");
                if let Err(e) = Inner::auto_activate(&inner, &family_id, generation).await {
                    warn!(error = %e, "auto-activation failed");
                    let _ = inner.errors.send(e);
                }
            }
        }

        // The snapshot channel closed. If this generation is still the
        // live one and nobody cancelled, the server dropped us.
        let state = inner.state.lock().await;
        if state.family_gen == generation && !subscription.handle.is_cancelled() {
            let _ = inner.errors.send(SyncError::SubscriptionDropped {
                collection: FAMILIES,
            });
        }
    }

    /// Applies item snapshots for one subscription generation.
    async fn apply_item_snapshots(
        inner: Arc<Inner>,
        mut subscription: Subscription,
        generation: u64,
    ) {
        while let Some(documents) = subscription.snapshots.recv().await {
            {
                let mut state = inner.state.lock().await;
                if state.item_gen != generation {
                    warn!(generation, "discarding stale item snapshot");
                    break;
                }
                state.items = decode_lossy(documents);
                debug!(count = state.items.len(), "item snapshot applied");
            }
            inner.changed.send_modify(|v| *v += 1);
        }

        let state = inner.state.lock().await;
        if state.item_gen == generation && !subscription.handle.is_cancelled() {
            let _ = inner.errors.send(SyncError::SubscriptionDropped {
                collection: GROCERY_ITEMS,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockClient;
    use crate::remote::Document;
    use crate::repos::to_fields;
    use std::time::{Duration, Instant};
    use tokio::time::sleep;

    fn family_doc(id: &str, name: &str, owner: &str) -> Document {
        let family = Family::new(name, "USD", owner);
        Document::new(id, to_fields(&family).unwrap())
    }

    fn item_doc(id: &str, family: &str, name: &str) -> Document {
        let item = GroceryItem::new(family, name);
        Document::new(id, to_fields(&item).unwrap())
    }

    fn store() -> (Arc<MockClient>, SyncStore, mpsc::UnboundedReceiver<SyncError>) {
        let client = Arc::new(MockClient::new());
        let (store, errors) = SyncStore::new(client.clone());
        (client, store, errors)
    }

    macro_rules! wait_until {
        ($cond:expr) => {{
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                if $cond {
                    break;
                }
                assert!(Instant::now() < deadline, "timed out waiting for condition");
                sleep(Duration::from_millis(5)).await;
            }
        }};
    }

    #[tokio::test]
    async fn test_init_with_empty_result() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();

        client.push_snapshot(0, vec![]);
        // Give the apply task a chance to run.
        sleep(Duration::from_millis(50)).await;

        assert!(store.families().await.is_empty());
        assert!(store.items().await.is_empty());
        assert!(store.active_family_id().await.is_none());
        // No item subscription was opened.
        assert_eq!(client.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_init_activates_first_family() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();

        client.push_snapshot(
            0,
            vec![
                family_doc("fam-a", "Alpha", "user-1"),
                family_doc("fam-b", "Beta", "user-1"),
            ],
        );

        wait_until!(store.active_family_id().await.as_deref() == Some("fam-a"));
        assert_eq!(store.families().await.len(), 2);

        // Exactly one item subscription, filtered by the first family.
        wait_until!(client.subscription_count() == 2);
        let filter = client.subscription_filter(1);
        assert_eq!(filter.field, "familyId");
        assert_eq!(filter.value, "fam-a");
    }

    #[tokio::test]
    async fn test_existing_active_family_is_kept() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();
        store.set_active_family("fam-b").await.unwrap();

        client.push_snapshot(
            0,
            vec![
                family_doc("fam-a", "Alpha", "user-1"),
                family_doc("fam-b", "Beta", "user-1"),
            ],
        );

        wait_until!(store.families().await.len() == 2);
        assert_eq!(store.active_family_id().await.as_deref(), Some("fam-b"));
        // init's family sub plus the one explicit item sub; no
        // auto-activation fired.
        assert_eq!(client.subscription_count(), 2);
    }

    #[tokio::test]
    async fn test_item_snapshots_update_items() {
        let (client, store, _errors) = store();
        store.set_active_family("fam-a").await.unwrap();

        client.push_snapshot(
            0,
            vec![item_doc("i1", "fam-a", "Milk"), item_doc("i2", "fam-a", "Eggs")],
        );

        wait_until!(store.items().await.len() == 2);
        let names: Vec<String> = store.items().await.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["Milk", "Eggs"]);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_discarded() {
        let (client, store, _errors) = store();
        store.set_active_family("fam-a").await.unwrap();
        store.set_active_family("fam-b").await.unwrap();

        // fam-a's subscription was replaced; its handle is cancelled.
        assert!(client.is_cancelled(0));
        assert!(!client.is_cancelled(1));

        // A snapshot from fam-a was already in flight when the switch
        // happened. It must not land in the state.
        client.push_snapshot_unchecked(0, vec![item_doc("i1", "fam-a", "Milk")]);
        sleep(Duration::from_millis(50)).await;
        assert!(store.items().await.is_empty());
        assert_eq!(store.active_family_id().await.as_deref(), Some("fam-b"));

        // The live subscription still works.
        client.push_snapshot(1, vec![item_doc("i2", "fam-b", "Eggs")]);
        wait_until!(store.items().await.len() == 1);
        assert_eq!(store.items().await[0].name, "Eggs");
    }

    #[tokio::test]
    async fn test_same_family_replaces_subscription_without_error() {
        let (client, store, _errors) = store();
        store.set_active_family("fam-a").await.unwrap();
        store.set_active_family("fam-a").await.unwrap();

        assert_eq!(client.subscription_count(), 2);
        assert!(client.is_cancelled(0));
        assert!(!client.is_cancelled(1));
        assert_eq!(store.active_family_id().await.as_deref(), Some("fam-a"));
    }

    #[tokio::test]
    async fn test_switch_keeps_items_until_first_snapshot() {
        let (client, store, _errors) = store();
        store.set_active_family("fam-a").await.unwrap();
        client.push_snapshot(0, vec![item_doc("i1", "fam-a", "Milk")]);
        wait_until!(store.items().await.len() == 1);

        store.set_active_family("fam-b").await.unwrap();
        // No flash: old items stay visible until fam-b delivers.
        assert_eq!(store.items().await.len(), 1);
        assert_eq!(store.active_family_id().await.as_deref(), Some("fam-b"));

        client.push_snapshot(1, vec![]);
        wait_until!(store.items().await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_twice_is_harmless() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();
        client.push_snapshot(0, vec![family_doc("fam-a", "Alpha", "user-1")]);
        wait_until!(store.active_family_id().await.is_some());

        store.cleanup().await;
        assert!(store.families().await.is_empty());
        assert!(store.items().await.is_empty());
        assert!(store.active_family_id().await.is_none());
        assert!(client.is_cancelled(0));
        assert!(client.is_cancelled(1));

        store.cleanup().await;
        assert!(store.families().await.is_empty());
        assert!(store.items().await.is_empty());
        assert!(store.active_family_id().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_after_cleanup_is_discarded() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();
        store.cleanup().await;

        client.push_snapshot_unchecked(0, vec![family_doc("fam-a", "Alpha", "user-1")]);
        sleep(Duration::from_millis(50)).await;
        assert!(store.families().await.is_empty());
        assert!(store.active_family_id().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_subscribe_leaves_state_untouched() {
        let (client, store, _errors) = store();
        store.set_active_family("fam-a").await.unwrap();
        client.push_snapshot(0, vec![item_doc("i1", "fam-a", "Milk")]);
        wait_until!(store.items().await.len() == 1);

        client.fail_next_subscribe();
        let err = store.set_active_family("fam-b").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Subscribe {
                collection: GROCERY_ITEMS,
                ..
            }
        ));

        // Stale-but-present beats blank: everything stays as it was.
        assert_eq!(store.items().await.len(), 1);
        assert_eq!(store.active_family_id().await.as_deref(), Some("fam-a"));
        assert!(!client.is_cancelled(0));

        // And the old subscription keeps delivering.
        client.push_snapshot(0, vec![]);
        wait_until!(store.items().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_init_keeps_families() {
        let (client, store, _errors) = store();
        store.init("user-1").await.unwrap();
        client.push_snapshot(0, vec![family_doc("fam-a", "Alpha", "user-1")]);
        wait_until!(!store.families().await.is_empty());

        client.fail_next_subscribe();
        assert!(store.init("user-1").await.is_err());
        assert_eq!(store.families().await.len(), 1);
        assert!(!client.is_cancelled(0));
    }

    #[tokio::test]
    async fn test_dropped_subscription_reports_sync_error() {
        let (client, store, mut errors) = store();
        store.set_active_family("fam-a").await.unwrap();
        client.push_snapshot(0, vec![item_doc("i1", "fam-a", "Milk")]);
        wait_until!(store.items().await.len() == 1);

        client.drop_subscription(0);

        let err = tokio::time::timeout(Duration::from_secs(2), errors.recv())
            .await
            .expect("no error reported")
            .unwrap();
        assert!(matches!(
            err,
            SyncError::SubscriptionDropped {
                collection: GROCERY_ITEMS
            }
        ));
        // Cached items survive the drop.
        assert_eq!(store.items().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cleanup_racing_auto_activation_never_resurrects_state() {
        // The auto-activation runs on a spawned task; whatever the
        // interleaving with cleanup, the store must end up empty and
        // every item subscription it opened must be cancelled.
        for _ in 0..50 {
            let (client, store, _errors) = store();
            store.init("user-1").await.unwrap();
            client.push_snapshot(0, vec![family_doc("fam-a", "Alpha", "user-1")]);
            store.cleanup().await;

            sleep(Duration::from_millis(10)).await;
            assert!(store.active_family_id().await.is_none());
            assert!(store.families().await.is_empty());
            assert!(store.items().await.is_empty());
            for i in 1..client.subscription_count() {
                assert!(client.is_cancelled(i), "orphaned item subscription {}", i);
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_explicit_activation_beats_auto_activation() {
        for _ in 0..50 {
            let (client, store, _errors) = store();
            store.init("user-1").await.unwrap();
            client.push_snapshot(
                0,
                vec![
                    family_doc("fam-a", "Alpha", "user-1"),
                    family_doc("fam-b", "Beta", "user-1"),
                ],
            );
            store.set_active_family("fam-b").await.unwrap();

            // Auto-activation of fam-a may still be in flight; it must
            // never override the explicit choice.
            sleep(Duration::from_millis(10)).await;
            assert_eq!(store.active_family_id().await.as_deref(), Some("fam-b"));
        }
    }

    #[tokio::test]
    async fn test_watch_changes_signals_updates() {
        let (client, store, _errors) = store();
        let mut changes = store.watch_changes();
        store.set_active_family("fam-a").await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .expect("no change signal")
            .unwrap();

        client.push_snapshot(0, vec![item_doc("i1", "fam-a", "Milk")]);
        tokio::time::timeout(Duration::from_secs(2), changes.changed())
            .await
            .expect("no change signal")
            .unwrap();
        assert_eq!(store.items().await.len(), 1);
    }
}
