use crate::aggregator::TokenAggregator;
use crate::error::{Error, Result};
use crate::query::apply_filters_and_sort;
use crate::scheduler::EventSink;
use crate::subscriptions::{ConnectionId, Subscription, SubscriptionPatch, SubscriptionRegistry};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use warp::ws::{Message, WebSocket};

/// Inbound client messages, tagged by `action`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe {
        #[serde(flatten)]
        payload: SubscriptionPatch,
    },
    UpdateSubscription {
        #[serde(flatten)]
        payload: SubscriptionPatch,
    },
}

/// Owns the outbound side of every live connection and assigns connection
/// ids. This is the `send_to` primitive the scheduler pushes through.
#[derive(Default)]
pub struct WsHub {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, tx: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.senders.write().await.insert(id, tx);
        id
    }

    async fn unregister(&self, id: ConnectionId) {
        self.senders.write().await.remove(&id);
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

#[async_trait]
impl EventSink for WsHub {
    async fn send_to(
        &self,
        connection_id: ConnectionId,
        event: &str,
        payload: Value,
    ) -> Result<()> {
        let senders = self.senders.read().await;
        let tx = senders
            .get(&connection_id)
            .ok_or_else(|| Error::DispatchError(format!("connection {} not found", connection_id)))?;
        let frame = serde_json::to_string(&json!({ "event": event, "data": payload }))?;
        tx.send(Message::text(frame))
            .map_err(|_| Error::DispatchError(format!("connection {} closed", connection_id)))
    }
}

/// Per-connection lifecycle: register, pump outbound messages, react to
/// inbound subscribe/update messages, tear down registry state on
/// disconnect.
pub async fn client_connected(
    socket: WebSocket,
    hub: Arc<WsHub>,
    registry: Arc<SubscriptionRegistry>,
    aggregator: Arc<TokenAggregator>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = hub.register(tx).await;
    info!("ws connected: {}", id);

    // outbound pump: everything addressed to this connection funnels
    // through one task so sends never interleave mid-frame
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                warn!("ws receive error on {}: {}", id, e);
                break;
            }
        };
        if message.is_close() {
            break;
        }
        let Ok(text) = message.to_str() else {
            continue;
        };
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Subscribe { payload }) => {
                handle_subscribe(id, payload, &hub, &registry, &aggregator).await;
            }
            Ok(ClientMessage::UpdateSubscription { payload }) => {
                registry.update(id, payload).await;
            }
            Err(e) => {
                warn!("ws message from {} not understood: {}", id, e);
                let _ = hub
                    .send_to(id, "error", json!({ "message": "unrecognized message" }))
                    .await;
            }
        }
    }

    info!("ws disconnected: {}", id);
    registry.unsubscribe(id).await;
    hub.unregister(id).await;
}

async fn handle_subscribe(
    id: ConnectionId,
    payload: SubscriptionPatch,
    hub: &Arc<WsHub>,
    registry: &Arc<SubscriptionRegistry>,
    aggregator: &Arc<TokenAggregator>,
) {
    let mut subscription = Subscription::default();
    subscription.apply(payload);
    registry.subscribe(id, subscription.clone()).await;

    match aggregator.get_tokens(false).await {
        Ok(tokens) => {
            let page = apply_filters_and_sort(&tokens, &subscription.to_query());
            match serde_json::to_value(&page) {
                Ok(payload) => {
                    let _ = hub.send_to(id, "initial_data", payload).await;
                    let _ = hub.send_to(id, "subscribed", json!({ "ok": true })).await;
                }
                Err(e) => warn!("initial data for {} not serializable: {}", id, e),
            }
        }
        Err(e) => {
            warn!("initial data fetch for {} failed: {}", id, e);
            let _ = hub
                .send_to(id, "error", json!({ "message": "failed to load tokens" }))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_unknown_connection_is_dispatch_error() {
        let hub = WsHub::new();
        let err = hub.send_to(42, "price_update_batch", json!([])).await;
        assert!(matches!(err, Err(Error::DispatchError(_))));
    }

    #[tokio::test]
    async fn test_send_to_registered_connection_frames_event() {
        let hub = WsHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await;

        hub.send_to(id, "subscribed", json!({ "ok": true }))
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        let frame: Value = serde_json::from_str(message.to_str().unwrap()).unwrap();
        assert_eq!(frame["event"], "subscribed");
        assert_eq!(frame["data"]["ok"], true);
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_unregister_drops_sender() {
        let hub = WsHub::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let a = hub.register(tx1).await;
        let b = hub.register(tx2).await;
        assert_ne!(a, b);
        assert_eq!(hub.connection_count().await, 2);

        hub.unregister(a).await;
        assert_eq!(hub.connection_count().await, 1);
        assert!(hub.send_to(a, "x", json!(null)).await.is_err());
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"subscribe","filters":{"protocol":"Orca"},"limit":10}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Subscribe { payload } => {
                assert_eq!(payload.limit, Some(10));
                assert_eq!(
                    payload.filters.unwrap().protocol.as_deref(),
                    Some("Orca")
                );
            }
            _ => panic!("wrong variant"),
        }

        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"update_subscription","sortBy":"market_cap"}"#)
                .unwrap();
        match msg {
            ClientMessage::UpdateSubscription { payload } => {
                assert_eq!(payload.sort_by.as_deref(), Some("market_cap"));
            }
            _ => panic!("wrong variant"),
        }
    }
}
