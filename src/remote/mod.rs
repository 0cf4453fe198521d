//! Remote document-store access.
//!
//! The hosted store exposes collections of schemaless documents with
//! CRUD, equality-filtered queries, and live query subscriptions. A
//! subscription delivers the full current result set on every
//! server-confirmed change (snapshots, not deltas).
//!
//! [`CollectionClient`] is the seam between the rest of the crate and
//! the wire client; tests substitute an in-memory implementation.

mod client;
pub mod protocol;

#[cfg(test)]
pub mod mock;

pub use client::RemoteClient;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors from CRUD or subscribe calls against the document store.
///
/// Repositories propagate these unchanged; only the sync store wraps
/// subscription-establishment failures.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("failed to decode document: {0}")]
    Decode(String),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("subscription rejected: {0}")]
    SubscriptionRejected(String),
    #[error("subscription request timed out")]
    SubscribeTimeout,
    #[error("connection closed")]
    Closed,
}

/// A document as stored remotely: a server-assigned id plus a flat
/// field map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A single equality constraint on a document field.
///
/// The store's query primitive only supports `field == value`, which is
/// all the repositories need (`familyId == X`, `ownerId == Y`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document matches this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.fields.get(&self.field) == Some(&self.value)
    }
}

/// Cancel handle for a live subscription.
///
/// Cancelling is idempotent. After `cancel` returns, the originating
/// client stops routing snapshots to the subscription's channel; any
/// snapshot already queued is discarded by the consumer's generation
/// check.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: Uuid,
    cancelled: Arc<AtomicBool>,
    cancel_tx: mpsc::UnboundedSender<Uuid>,
}

impl SubscriptionHandle {
    pub fn new(id: Uuid, cancel_tx: mpsc::UnboundedSender<Uuid>) -> Self {
        Self {
            id,
            cancelled: Arc::new(AtomicBool::new(false)),
            cancel_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the subscription. Safe to call more than once; only the
    /// first call notifies the client.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            // Receiver may already be gone on shutdown; nothing to do then.
            let _ = self.cancel_tx.send(self.id);
        }
    }
}

/// A live query subscription: a stream of full result-set snapshots
/// plus the handle used to cancel it.
///
/// The channel closing without a prior `cancel` means the subscription
/// dropped server-side.
#[derive(Debug)]
pub struct Subscription {
    pub snapshots: mpsc::UnboundedReceiver<Vec<Document>>,
    pub handle: SubscriptionHandle,
}

/// Client interface to the hosted document store.
#[async_trait]
pub trait CollectionClient: Send + Sync {
    /// Create a document; returns the server-assigned id.
    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError>;

    /// Fetch a single document by id. `Ok(None)` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError>;

    /// List all documents matching an equality filter.
    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RemoteError>;

    /// Merge-patch a document's fields.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), RemoteError>;

    /// Delete a document.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;

    /// Open a live subscription on an equality-filtered query.
    async fn subscribe(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Subscription, RemoteError>;
}
