//! Wire messages for the live-query WebSocket channel.
//!
//! Messages are JSON text frames. Field names use camelCase to match
//! the store's HTTP document format.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::Document;

/// Message types exchanged over the subscription channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireMessage {
    /// Sent by the client to initiate the handshake
    #[serde(rename = "hello")]
    Hello {
        #[serde(rename = "senderId")]
        sender_id: String,
        #[serde(rename = "protocolVersion")]
        protocol_version: String,
    },
    /// Sent by the server to confirm the handshake
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(rename = "senderId")]
        sender_id: String,
        #[serde(rename = "targetId")]
        target_id: String,
    },
    /// Open a live query on an equality-filtered collection
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(rename = "subscriptionId")]
        subscription_id: Uuid,
        collection: String,
        field: String,
        value: Value,
    },
    /// Server acknowledgement that a subscription is live
    #[serde(rename = "subscribed")]
    Subscribed {
        #[serde(rename = "subscriptionId")]
        subscription_id: Uuid,
    },
    /// Close a live query
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        #[serde(rename = "subscriptionId")]
        subscription_id: Uuid,
    },
    /// Full current result set for a subscription
    #[serde(rename = "snapshot")]
    Snapshot {
        #[serde(rename = "subscriptionId")]
        subscription_id: Uuid,
        documents: Vec<Document>,
    },
    /// Error from the server, scoped to a subscription when one is given
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "subscriptionId", skip_serializing_if = "Option::is_none")]
        subscription_id: Option<Uuid>,
        message: String,
    },
    /// Sent by the client before disconnecting
    #[serde(rename = "bye")]
    Bye {
        #[serde(rename = "senderId")]
        sender_id: String,
    },
}

impl WireMessage {
    /// Encode message as a JSON string.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode message from a JSON string.
    pub fn decode(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Generate a random peer ID for a connection.
pub fn generate_peer_id() -> String {
    Uuid::new_v4().to_string()
}
