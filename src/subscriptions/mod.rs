use crate::metrics::ACTIVE_SUBSCRIPTIONS;
use crate::query::{TokenFilters, TokenQuery};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Opaque id the transport layer assigns to each live connection.
pub type ConnectionId = u64;

/// What one subscriber wants to see. Created at subscribe time, shallow-
/// merged on update, removed on disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    pub filters: TokenFilters,
    pub sort_by: String,
    pub limit: usize,
    pub cursor: String,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            filters: TokenFilters::default(),
            sort_by: "volume".to_string(),
            limit: 30,
            cursor: "0".to_string(),
        }
    }
}

impl Subscription {
    pub fn to_query(&self) -> TokenQuery {
        TokenQuery {
            filters: self.filters.clone(),
            sort_by: Some(self.sort_by.clone()),
            limit: Some(self.limit),
            cursor: Some(self.cursor.clone()),
        }
    }

    /// Shallow merge: only fields present in the patch are replaced;
    /// `filters` is swapped wholesale, not merged key by key.
    pub fn apply(&mut self, patch: SubscriptionPatch) {
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
        if let Some(cursor) = patch.cursor {
            self.cursor = cursor;
        }
    }
}

/// Partial subscription payload from `subscribe` / `update_subscription`
/// messages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionPatch {
    pub filters: Option<TokenFilters>,
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// The one piece of state shared between the connection lifecycle and the
/// refresh loop. All access goes through these methods; the map itself is
/// never handed out.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<HashMap<ConnectionId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, id: ConnectionId, subscription: Subscription) {
        let mut map = self.inner.write().await;
        map.insert(id, subscription);
        ACTIVE_SUBSCRIPTIONS.set(map.len() as f64);
    }

    /// Merge `patch` into the existing subscription, or into a fresh
    /// default one if the connection never sent `subscribe`.
    pub async fn update(&self, id: ConnectionId, patch: SubscriptionPatch) {
        let mut map = self.inner.write().await;
        let entry = map.entry(id).or_default();
        entry.apply(patch);
        ACTIVE_SUBSCRIPTIONS.set(map.len() as f64);
    }

    pub async fn unsubscribe(&self, id: ConnectionId) -> Option<Subscription> {
        let mut map = self.inner.write().await;
        let removed = map.remove(&id);
        ACTIVE_SUBSCRIPTIONS.set(map.len() as f64);
        removed
    }

    pub async fn get(&self, id: ConnectionId) -> Option<Subscription> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Point-in-time copy for one dispatch pass; the scheduler iterates
    /// this so a tick never observes a half-applied update.
    pub async fn snapshot(&self) -> Vec<(ConnectionId, Subscription)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
