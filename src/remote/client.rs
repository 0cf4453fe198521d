//! HTTP + WebSocket client for the hosted document store.
//!
//! CRUD and one-shot queries go over HTTP. Live subscriptions share a
//! single WebSocket connection: after a `hello`/`welcome` handshake the
//! client sends `subscribe` messages and a reader task routes incoming
//! `snapshot` frames to per-subscription channels.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

use super::protocol::{generate_peer_id, WireMessage};
use super::{CollectionClient, Document, Filter, RemoteError, Subscription, SubscriptionHandle};

/// Timeout for handshake completion.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for the server to acknowledge a subscribe request.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Deserialize)]
struct CreateResponse {
    id: String,
}

#[derive(Deserialize)]
struct ListResponse {
    documents: Vec<Document>,
}

/// Routing entry for one live subscription.
struct Route {
    /// Pending until the server acknowledges the subscribe request
    ack: Option<oneshot::Sender<Result<(), RemoteError>>>,
    snapshots: mpsc::UnboundedSender<Vec<Document>>,
}

type Routes = Arc<StdMutex<HashMap<Uuid, Route>>>;

/// One established WebSocket connection shared by all subscriptions.
struct Conn {
    outbound: mpsc::UnboundedSender<Message>,
    cancel_tx: mpsc::UnboundedSender<Uuid>,
    routes: Routes,
    peer_id: String,
}

impl Conn {
    fn is_alive(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Client for the famcart document store.
///
/// Cheap to share behind an `Arc`; the WebSocket connection is opened
/// lazily on the first `subscribe` and reused afterwards.
pub struct RemoteClient {
    server_url: String,
    api_key: String,
    http: reqwest::Client,
    conn: Mutex<Option<Conn>>,
}

impl RemoteClient {
    pub fn new(server_url: String, api_key: String) -> Self {
        Self {
            server_url,
            api_key,
            http: reqwest::Client::new(),
            conn: Mutex::new(None),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Sends a `bye` and drops the WebSocket connection, if one exists.
    pub async fn close(&self) {
        let mut conn = self.conn.lock().await;
        if let Some(conn) = conn.take() {
            if let Ok(encoded) = (WireMessage::Bye {
                sender_id: conn.peer_id.clone(),
            })
            .encode()
            {
                let _ = conn.outbound.send(Message::Text(encoded.into()));
            }
            let _ = conn.outbound.send(Message::Close(None));
        }
    }

    /// Opens the WebSocket connection and performs the handshake.
    async fn connect(&self) -> Result<Conn, RemoteError> {
        let ws_url = self.build_ws_url();
        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let (mut sender, mut receiver) = ws_stream.split();
        let peer_id = generate_peer_id();

        self.perform_handshake(&mut sender, &mut receiver, &peer_id)
            .await?;

        let routes: Routes = Arc::new(StdMutex::new(HashMap::new()));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();

        tokio::spawn(writer_task(sender, outbound_rx, cancel_rx, routes.clone()));
        tokio::spawn(reader_task(receiver, outbound_tx.clone(), routes.clone()));

        debug!(peer_id = %peer_id, "live-query connection established");

        Ok(Conn {
            outbound: outbound_tx,
            cancel_tx,
            routes,
            peer_id,
        })
    }

    /// Performs the handshake with the server.
    ///
    /// Sends a `hello` message and waits for a `welcome` response.
    async fn perform_handshake(
        &self,
        sender: &mut WsSink,
        receiver: &mut WsSource,
        peer_id: &str,
    ) -> Result<String, RemoteError> {
        let hello = WireMessage::Hello {
            sender_id: peer_id.to_string(),
            protocol_version: "1".to_string(),
        };

        let encoded = hello
            .encode()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        sender
            .send(Message::Text(encoded.into()))
            .await
            .map_err(|e| RemoteError::WebSocket(e.to_string()))?;

        // Wait for welcome response with timeout
        let welcome = timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(msg_result) = receiver.next().await {
                match msg_result {
                    Ok(Message::Text(data)) => {
                        let msg = WireMessage::decode(data.as_str())
                            .map_err(|e| RemoteError::Decode(e.to_string()))?;

                        match msg {
                            WireMessage::Welcome {
                                sender_id,
                                target_id,
                            } => {
                                if target_id != peer_id {
                                    return Err(RemoteError::Handshake(
                                        "welcome target_id mismatch".to_string(),
                                    ));
                                }
                                return Ok(sender_id);
                            }
                            WireMessage::Error { message, .. } => {
                                return Err(RemoteError::Handshake(message));
                            }
                            _ => {
                                return Err(RemoteError::Handshake(format!(
                                    "unexpected message during handshake: {:?}",
                                    msg
                                )));
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        return Err(RemoteError::Handshake(
                            "server closed connection during handshake".to_string(),
                        ));
                    }
                    Ok(_) => {
                        // Ignore other frame types
                    }
                    Err(e) => {
                        return Err(RemoteError::WebSocket(e.to_string()));
                    }
                }
            }
            Err(RemoteError::Handshake(
                "connection closed before handshake completed".to_string(),
            ))
        })
        .await;

        match welcome {
            Ok(result) => result,
            Err(_) => Err(RemoteError::HandshakeTimeout),
        }
    }

    /// Builds the WebSocket URL for the live-query endpoint.
    fn build_ws_url(&self) -> String {
        // Convert http(s) to ws(s) if needed
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replace("http://", "ws://")
        } else if self.server_url.starts_with("https://") {
            self.server_url.replace("https://", "wss://")
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}/watch?key={}", base_url, self.api_key)
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        // Convert ws(s) to http(s) if needed
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replace("ws://", "http://")
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replace("wss://", "https://")
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    fn documents_url(&self, collection: &str) -> String {
        self.build_http_url(&format!("/collections/{}/documents", collection))
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        self.build_http_url(&format!("/collections/{}/documents/{}", collection, id))
    }
}

/// Drains outgoing frames and handles cancel requests.
///
/// Cancellation removes the route before the `unsubscribe` frame goes
/// out, so no snapshot can be delivered through a cancelled handle.
async fn writer_task(
    mut sink: WsSink,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut cancels: mpsc::UnboundedReceiver<Uuid>,
    routes: Routes,
) {
    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
            id = cancels.recv() => {
                let Some(id) = id else { break };
                routes.lock().expect("routes lock poisoned").remove(&id);
                let unsubscribe = WireMessage::Unsubscribe { subscription_id: id };
                if let Ok(encoded) = unsubscribe.encode() {
                    if sink.send(Message::Text(encoded.into())).await.is_err() {
                        break;
                    }
                }
                debug!(subscription_id = %id, "subscription cancelled");
            }
        }
    }
}

/// Reads frames and routes snapshots to subscription channels.
///
/// When the connection ends, all routes are dropped; consumers observe
/// their snapshot channel closing.
async fn reader_task(mut source: WsSource, outbound: mpsc::UnboundedSender<Message>, routes: Routes) {
    while let Some(msg_result) = source.next().await {
        match msg_result {
            Ok(Message::Text(data)) => {
                let msg = match WireMessage::decode(data.as_str()) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "undecodable frame from server");
                        continue;
                    }
                };

                match msg {
                    WireMessage::Subscribed { subscription_id } => {
                        let mut routes = routes.lock().expect("routes lock poisoned");
                        if let Some(route) = routes.get_mut(&subscription_id) {
                            if let Some(ack) = route.ack.take() {
                                let _ = ack.send(Ok(()));
                            }
                        }
                    }
                    WireMessage::Snapshot {
                        subscription_id,
                        documents,
                    } => {
                        let routes = routes.lock().expect("routes lock poisoned");
                        match routes.get(&subscription_id) {
                            Some(route) => {
                                let _ = route.snapshots.send(documents);
                            }
                            None => {
                                // Snapshot raced an unsubscribe; drop it.
                                debug!(subscription_id = %subscription_id, "snapshot for closed subscription discarded");
                            }
                        }
                    }
                    WireMessage::Error {
                        subscription_id: Some(id),
                        message,
                    } => {
                        let route = routes.lock().expect("routes lock poisoned").remove(&id);
                        match route {
                            Some(Route { ack: Some(ack), .. }) => {
                                let _ = ack.send(Err(RemoteError::SubscriptionRejected(message)));
                            }
                            Some(_) => {
                                // Dropping the route closes the snapshot
                                // channel; the consumer reports the drop.
                                warn!(subscription_id = %id, error = %message, "subscription dropped by server");
                            }
                            None => {}
                        }
                    }
                    WireMessage::Error {
                        subscription_id: None,
                        message,
                    } => {
                        warn!(error = %message, "server error");
                    }
                    _ => {
                        // Hello/Welcome/Subscribe/Bye are client-to-server
                        // or handshake-only; ignore here.
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = outbound.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Ignore other frame types
            }
            Err(e) => {
                warn!(error = %e, "live-query connection error");
                break;
            }
        }
    }

    // Closing every snapshot channel tells consumers the connection died.
    routes.lock().expect("routes lock poisoned").clear();
}

#[async_trait::async_trait]
impl CollectionClient for RemoteClient {
    async fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, RemoteError> {
        let response = self
            .http
            .post(self.documents_url(collection))
            .bearer_auth(&self.api_key)
            .json(&fields)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(created.id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let response = self
            .http
            .get(self.document_url(collection, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let doc: Document = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn list(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, RemoteError> {
        let value = serde_json::to_string(&filter.value)
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        let response = self
            .http
            .get(self.documents_url(collection))
            .bearer_auth(&self.api_key)
            .query(&[("field", filter.field.as_str()), ("value", value.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let listed: ListResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(listed.documents)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .patch(self.document_url(collection, id))
            .bearer_auth(&self.api_key)
            .json(&patch)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let response = self
            .http
            .delete(self.document_url(collection, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Subscription, RemoteError> {
        let mut conn_guard = self.conn.lock().await;

        // (Re)connect if there is no live connection.
        let needs_connect = match conn_guard.as_ref() {
            Some(conn) => !conn.is_alive(),
            None => true,
        };
        if needs_connect {
            *conn_guard = Some(self.connect().await?);
        }
        let conn = conn_guard.as_ref().ok_or(RemoteError::Closed)?;

        let subscription_id = Uuid::new_v4();
        let (ack_tx, ack_rx) = oneshot::channel();
        let (snap_tx, snap_rx) = mpsc::unbounded_channel();

        conn.routes
            .lock()
            .expect("routes lock poisoned")
            .insert(
                subscription_id,
                Route {
                    ack: Some(ack_tx),
                    snapshots: snap_tx,
                },
            );

        let subscribe = WireMessage::Subscribe {
            subscription_id,
            collection: collection.to_string(),
            field: filter.field.clone(),
            value: filter.value.clone(),
        };
        let encoded = subscribe
            .encode()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        if conn.outbound.send(Message::Text(encoded.into())).is_err() {
            conn.routes
                .lock()
                .expect("routes lock poisoned")
                .remove(&subscription_id);
            return Err(RemoteError::Closed);
        }

        let cancel_tx = conn.cancel_tx.clone();
        let routes = conn.routes.clone();
        drop(conn_guard);

        // Wait for the server to confirm before handing out the stream.
        match timeout(SUBSCRIBE_TIMEOUT, ack_rx).await {
            Ok(Ok(Ok(()))) => Ok(Subscription {
                snapshots: snap_rx,
                handle: SubscriptionHandle::new(subscription_id, cancel_tx),
            }),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(RemoteError::Closed),
            Err(_) => {
                routes
                    .lock()
                    .expect("routes lock poisoned")
                    .remove(&subscription_id);
                Err(RemoteError::SubscribeTimeout)
            }
        }
    }
}
