use crate::aggregator::TokenAggregator;
use crate::error::Result;
use crate::metrics::REFRESH_TICKS;
use crate::models::{PriceUpdate, Token, UpdateKind, VolumeSpike};
use crate::query::token_matches_filters;
use crate::subscriptions::{ConnectionId, SubscriptionRegistry};
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[cfg(test)]
use mockall::automock;

/// Threshold below which a price move is considered noise, in percent.
const PRICE_CHANGE_MIN_PCT: f64 = 0.1;
/// Volume ratio that counts as a spike.
const VOLUME_SPIKE_RATIO: f64 = 2.0;

/// Outbound push seam. The WebSocket hub implements this; the scheduler
/// only ever talks to subscribers through it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_to(&self, connection_id: ConnectionId, event: &str, payload: Value)
        -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct Diffs {
    pub price_updates: Vec<PriceUpdate>,
    pub volume_spikes: Vec<VolumeSpike>,
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn key_map(tokens: &[Token]) -> HashMap<String, &Token> {
    let mut map = HashMap::new();
    for token in tokens {
        let key = token.identity_key();
        if !key.is_empty() {
            map.insert(key, token);
        }
    }
    map
}

/// Diff two snapshots into push events. New tokens produce a price update
/// with no percentage; known tokens produce one only for moves of at least
/// 0.1% off a nonzero base; volume at 2x or more of the previous value
/// produces a spike. Tokens that disappeared produce nothing.
pub fn compute_diffs(prev: &[Token], fresh: &[Token]) -> Diffs {
    let prev_map = key_map(prev);
    let now = Utc::now().timestamp_millis();
    let mut diffs = Diffs::default();

    for token in fresh {
        let key = token.identity_key();
        if key.is_empty() {
            continue;
        }
        let old = match prev_map.get(&key) {
            Some(old) => *old,
            None => {
                diffs.price_updates.push(PriceUpdate {
                    token_address: token.token_address.clone(),
                    price_sol: token.price_sol,
                    price_change_pct: None,
                    volume_sol: token.volume_sol,
                    kind: UpdateKind::New,
                    ts: now,
                });
                continue;
            }
        };

        let old_price = old.price_sol.unwrap_or(0.0);
        let new_price = token.price_sol.unwrap_or(0.0);
        if old_price != 0.0 && new_price != old_price {
            let pct = (new_price - old_price) / old_price.abs() * 100.0;
            if pct.abs() >= PRICE_CHANGE_MIN_PCT {
                diffs.price_updates.push(PriceUpdate {
                    token_address: token.token_address.clone(),
                    price_sol: Some(new_price),
                    price_change_pct: Some(round_to(pct, 4)),
                    volume_sol: token.volume_sol,
                    kind: UpdateKind::Price,
                    ts: now,
                });
            }
        }

        let old_volume = old.volume_sol.unwrap_or(0.0);
        let new_volume = token.volume_sol.unwrap_or(0.0);
        if old_volume > 0.0 && new_volume / old_volume >= VOLUME_SPIKE_RATIO {
            diffs.volume_spikes.push(VolumeSpike {
                token_address: token.token_address.clone(),
                old_volume,
                volume_sol: new_volume,
                multiplier: round_to(new_volume / old_volume, 2),
                ts: now,
            });
        }
    }

    diffs
}

/// Drives the refresh-diff-dispatch cycle. One task owns the `prev`
/// snapshot; every subscriber dispatched within a tick sees the same
/// `prev`/`fresh` pair. Any failure in a tick is logged and the next tick
/// starts from the unchanged `prev`.
pub struct DiffScheduler {
    aggregator: Arc<TokenAggregator>,
    registry: Arc<SubscriptionRegistry>,
    sink: Arc<dyn EventSink>,
    interval: Duration,
}

/// Owning handle for the scheduler task; dropping it does not stop the
/// loop, calling `stop` does.
pub struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

impl DiffScheduler {
    pub fn new(
        aggregator: Arc<TokenAggregator>,
        registry: Arc<SubscriptionRegistry>,
        sink: Arc<dyn EventSink>,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            registry,
            sink,
            interval,
        }
    }

    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            // establish the baseline snapshot before the first tick; an
            // empty baseline just means the first tick reports everything
            // as new
            let mut prev: Vec<Token> = match self.aggregator.get_tokens(true).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!("initial snapshot fetch failed: {}", e);
                    Vec::new()
                }
            };
            info!(
                "diff scheduler started: {} tokens baseline, interval {}ms",
                prev.len(),
                self.interval.as_millis()
            );

            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_tick(&prev).await {
                            Ok(fresh) => prev = fresh,
                            Err(e) => warn!("scheduler tick failed: {}", e),
                        }
                    }
                    _ = &mut stop_rx => {
                        info!("diff scheduler stopping");
                        break;
                    }
                }
            }
        });
        SchedulerHandle { stop_tx, task }
    }

    /// One refresh cycle. Returns the fresh snapshot to install as `prev`;
    /// an error leaves the caller's `prev` untouched.
    async fn run_tick(&self, prev: &[Token]) -> Result<Vec<Token>> {
        REFRESH_TICKS.inc();
        let fresh = self.aggregator.get_tokens(true).await?;
        let diffs = compute_diffs(prev, &fresh);
        if !diffs.price_updates.is_empty() || !diffs.volume_spikes.is_empty() {
            info!(
                "tick: {} price updates, {} volume spikes across {} tokens",
                diffs.price_updates.len(),
                diffs.volume_spikes.len(),
                fresh.len()
            );
        }

        self.dispatch(&diffs, &fresh).await;
        Ok(fresh)
    }

    /// Fan the tick's events out to every subscriber, each seeing only the
    /// events whose token passes its own filters. Dispatch failures are
    /// logged and skipped; the connection teardown path removes dead
    /// subscribers.
    async fn dispatch(&self, diffs: &Diffs, fresh: &[Token]) {
        let fresh_by_key = key_map(fresh);
        let subscribers = self.registry.snapshot().await;

        for (connection_id, subscription) in subscribers {
            let matches = |address: &Option<String>| -> bool {
                address
                    .as_deref()
                    .and_then(|a| fresh_by_key.get(&a.to_lowercase()))
                    .map(|token| token_matches_filters(token, &subscription.filters))
                    .unwrap_or(false)
            };

            let price_updates: Vec<&PriceUpdate> = diffs
                .price_updates
                .iter()
                .filter(|u| matches(&u.token_address))
                .collect();
            if !price_updates.is_empty() {
                if let Err(e) = self
                    .send_batch(connection_id, "price_update_batch", &price_updates)
                    .await
                {
                    warn!("dispatch to subscriber {} failed: {}", connection_id, e);
                    continue;
                }
            }

            let volume_spikes: Vec<&VolumeSpike> = diffs
                .volume_spikes
                .iter()
                .filter(|s| matches(&s.token_address))
                .collect();
            if !volume_spikes.is_empty() {
                if let Err(e) = self
                    .send_batch(connection_id, "volume_spike_batch", &volume_spikes)
                    .await
                {
                    warn!("dispatch to subscriber {} failed: {}", connection_id, e);
                }
            }
        }
    }

    async fn send_batch<T: serde::Serialize>(
        &self,
        connection_id: ConnectionId,
        event: &str,
        batch: &[T],
    ) -> Result<()> {
        let payload = serde_json::to_value(batch)?;
        self.sink.send_to(connection_id, event, payload).await
    }
}
