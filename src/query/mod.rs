use crate::models::Token;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: usize = 20;

/// Filter criteria shared by on-demand queries and live subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenFilters {
    /// Which price-change window drives `sort_by = "price_change"`.
    pub period: Option<String>,
    pub min_volume: Option<f64>,
    pub protocol: Option<String>,
    /// Case-insensitive substring match on name or ticker.
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenQuery {
    pub filters: TokenFilters,
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    /// Offset into the filtered+sorted list, as a string.
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPage {
    pub items: Vec<Token>,
    pub next_cursor: Option<String>,
    pub total: usize,
}

fn price_change(token: &Token, period: &str) -> f64 {
    let value = match period {
        "1h" => token.price_1hr_change,
        "7d" => token.price_7d_change,
        _ => token.price_24h_change,
    };
    value.unwrap_or(0.0)
}

/// Single-token filter predicate; the scheduler reuses this so push feeds
/// and query responses agree on what a subscriber sees.
pub fn token_matches_filters(token: &Token, filters: &TokenFilters) -> bool {
    if let Some(min_volume) = filters.min_volume {
        if token.volume_sol.unwrap_or(0.0) < min_volume {
            return false;
        }
    }
    if let Some(protocol) = &filters.protocol {
        if !token
            .protocol
            .as_deref()
            .unwrap_or("")
            .eq_ignore_ascii_case(protocol)
        {
            return false;
        }
    }
    if let Some(q) = &filters.q {
        let q = q.to_lowercase();
        let name_hit = token
            .token_name
            .as_deref()
            .map(|n| n.to_lowercase().contains(&q))
            .unwrap_or(false);
        let ticker_hit = token
            .token_ticker
            .as_deref()
            .map(|t| t.to_lowercase().contains(&q))
            .unwrap_or(false);
        if !name_hit && !ticker_hit {
            return false;
        }
    }
    true
}

/// Filter, sort (descending, stable) and cursor-paginate a snapshot.
/// Missing numeric fields compare as 0. The limit arrives pre-clamped by
/// the transport layer; out-of-range values just slice differently.
pub fn apply_filters_and_sort(tokens: &[Token], query: &TokenQuery) -> TokenPage {
    let sort_by = query.sort_by.as_deref().unwrap_or("volume");
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let cursor = query
        .cursor
        .as_deref()
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    let period = query.filters.period.as_deref().unwrap_or("24h");

    let mut list: Vec<Token> = tokens
        .iter()
        .filter(|t| token_matches_filters(t, &query.filters))
        .cloned()
        .collect();

    let sort_key = |t: &Token| -> f64 {
        match sort_by {
            "market_cap" => t.market_cap_sol.unwrap_or(0.0),
            "price_change" => price_change(t, period),
            _ => t.volume_sol.unwrap_or(0.0),
        }
    };
    // Vec::sort_by is stable: ties keep their snapshot order across runs
    list.sort_by(|a, b| {
        sort_key(b)
            .partial_cmp(&sort_key(a))
            .unwrap_or(Ordering::Equal)
    });

    let total = list.len();
    let start = cursor.min(total);
    let end = cursor.saturating_add(limit).min(total);
    let items: Vec<Token> = list[start..end].to_vec();
    let next_cursor = if start + items.len() < total {
        Some((start + items.len()).to_string())
    } else {
        None
    };

    TokenPage {
        items,
        next_cursor,
        total,
    }
}
