use serde::{Deserialize, Serialize};

/// What a price-update event describes: a token newly appearing in the
/// snapshot, or an actual price move on a token we already tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    New,
    Price,
}

/// Pushed to subscribers in a `price_update_batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub token_address: Option<String>,
    pub price_sol: Option<f64>,
    /// Percent change since the previous snapshot, rounded to 4 decimals.
    /// `None` for tokens that were not in the previous snapshot.
    pub price_change_pct: Option<f64>,
    pub volume_sol: Option<f64>,
    pub kind: UpdateKind,
    /// Unix millis at diff time.
    pub ts: i64,
}

/// Pushed to subscribers in a `volume_spike_batch` when volume at least
/// doubles between two consecutive snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpike {
    pub token_address: Option<String>,
    pub old_volume: f64,
    pub volume_sol: f64,
    /// `volume_sol / old_volume`, rounded to 2 decimals.
    pub multiplier: f64,
    pub ts: i64,
}
