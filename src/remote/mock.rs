//! In-memory `CollectionClient` for tests.
//!
//! Holds documents per collection and lets tests drive subscription
//! deliveries by hand, including simulating snapshots still in flight
//! for an already-cancelled subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{CollectionClient, Document, Filter, RemoteError, Subscription, SubscriptionHandle};

struct MockSub {
    collection: String,
    filter: Filter,
    sender: mpsc::UnboundedSender<Vec<Document>>,
    handle: SubscriptionHandle,
    // Kept alive so cancel() sends don't error
    _cancel_rx: mpsc::UnboundedReceiver<Uuid>,
}

#[derive(Default)]
pub struct MockClient {
    collections: StdMutex<HashMap<String, Vec<Document>>>,
    subs: StdMutex<Vec<Option<MockSub>>>,
    next_id: AtomicU64,
    fail_next_subscribe: AtomicBool,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `subscribe` call fail with a connection error.
    pub fn fail_next_subscribe(&self) {
        self.fail_next_subscribe.store(true, Ordering::SeqCst);
    }

    /// Total subscriptions ever opened, including dropped ones.
    pub fn subscription_count(&self) -> usize {
        self.subs.lock().unwrap().len()
    }

    pub fn subscription_filter(&self, index: usize) -> Filter {
        self.subs.lock().unwrap()[index]
            .as_ref()
            .expect("subscription dropped")
            .filter
            .clone()
    }

    pub fn subscription_collection(&self, index: usize) -> String {
        self.subs.lock().unwrap()[index]
            .as_ref()
            .expect("subscription dropped")
            .collection
            .clone()
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        self.subs.lock().unwrap()[index]
            .as_ref()
            .expect("subscription dropped")
            .handle
            .is_cancelled()
    }

    /// Deliver a snapshot through subscription `index`, respecting
    /// cancellation (a cancelled handle delivers nothing).
    pub fn push_snapshot(&self, index: usize, documents: Vec<Document>) {
        let subs = self.subs.lock().unwrap();
        let sub = subs[index].as_ref().expect("subscription dropped");
        if !sub.handle.is_cancelled() {
            let _ = sub.sender.send(documents);
        }
    }

    /// Deliver a snapshot even through a cancelled handle, simulating a
    /// notification that was already in flight when the subscription
    /// was torn down.
    pub fn push_snapshot_unchecked(&self, index: usize, documents: Vec<Document>) {
        let subs = self.subs.lock().unwrap();
        let sub = subs[index].as_ref().expect("subscription dropped");
        let _ = sub.sender.send(documents);
    }

    /// Simulate a server-side drop: the snapshot channel closes without
    /// the consumer having cancelled.
    pub fn drop_subscription(&self, index: usize) {
        self.subs.lock().unwrap()[index] = None;
    }

    /// Current result set for a filter, as a subscription would see it.
    pub fn snapshot_for(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push the current matching result set to every live subscription
    /// on `collection`, as the server does after a confirmed write.
    pub fn notify(&self, collection: &str) {
        let snapshots: Vec<(usize, Vec<Document>)> = {
            let subs = self.subs.lock().unwrap();
            subs.iter()
                .enumerate()
                .filter_map(|(i, sub)| sub.as_ref().map(|s| (i, s)))
                .filter(|(_, s)| s.collection == collection && !s.handle.is_cancelled())
                .map(|(i, s)| (i, self.snapshot_for(collection, &s.filter)))
                .collect()
        };
        for (i, docs) in snapshots {
            self.push_snapshot(i, docs);
        }
    }
}

#[async_trait]
impl CollectionClient for MockClient {
    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("doc-{}", n);
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));
        self.notify(collection);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RemoteError> {
        Ok(self.snapshot_for(collection, filter))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), RemoteError> {
        {
            let mut collections = self.collections.lock().unwrap();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or(RemoteError::Status(404))?;
            for (key, value) in patch {
                doc.fields.insert(key, value);
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        {
            let mut collections = self.collections.lock().unwrap();
            let docs = collections
                .get_mut(collection)
                .ok_or(RemoteError::Status(404))?;
            let len_before = docs.len();
            docs.retain(|d| d.id != id);
            if docs.len() == len_before {
                return Err(RemoteError::Status(404));
            }
        }
        self.notify(collection);
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Subscription, RemoteError> {
        if self.fail_next_subscribe.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::Connection("mock subscribe failure".to_string()));
        }

        let (snap_tx, snap_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new(Uuid::new_v4(), cancel_tx);

        self.subs.lock().unwrap().push(Some(MockSub {
            collection: collection.to_string(),
            filter: filter.clone(),
            sender: snap_tx,
            handle: handle.clone(),
            _cancel_rx: cancel_rx,
        }));

        Ok(Subscription {
            snapshots: snap_rx,
            handle,
        })
    }
}
