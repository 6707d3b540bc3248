use crate::models::Token;
use serde_json::Value;
use std::collections::HashMap;

/// Ordered field-name candidates per canonical field. First key holding a
/// usable value wins; a `.` in a key descends one level into a nested
/// object (DexScreener nests under `token`/`dex`). Canonical names appear
/// in each list so already-normalized records pass through unchanged.
const ADDRESS_KEYS: &[&str] = &["address", "token_address", "id", "token.address"];
const NAME_KEYS: &[&str] = &["name", "token_name", "token.name"];
const TICKER_KEYS: &[&str] = &["symbol", "token_ticker", "token.symbol"];
const PRICE_KEYS: &[&str] = &["price", "token.price", "price_sol", "quote", "priceUsd"];
const MARKET_CAP_KEYS: &[&str] = &["marketCap", "market_cap", "market_cap_sol"];
const VOLUME_KEYS: &[&str] = &["volume_24h", "volume", "volume_sol"];
const LIQUIDITY_KEYS: &[&str] = &["liquidity", "liquidity_sol"];
const TX_COUNT_KEYS: &[&str] = &["tx_count", "transaction_count"];
const CHANGE_1H_KEYS: &[&str] = &["priceChange1h", "price_1hr_change"];
const CHANGE_24H_KEYS: &[&str] = &["priceChange24h", "price_24h_change"];
const CHANGE_7D_KEYS: &[&str] = &["priceChange7d", "price_7d_change"];
const PROTOCOL_KEYS: &[&str] = &["protocol", "dex.name"];

fn lookup<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    match key.split_once('.') {
        Some((outer, inner)) => raw.get(outer)?.get(inner),
        None => raw.get(key),
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Sources disagree even on scalar types: DexScreener ships numeric fields
// as strings ("priceUsd": "0.0012"), GeckoTerminal as numbers.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| lookup(raw, k).and_then(coerce_string))
}

fn first_f64(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| lookup(raw, k).and_then(coerce_f64))
}

fn first_i64(raw: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| lookup(raw, k).and_then(coerce_i64))
}

/// Map one raw source record into the canonical shape. Pure; unknown and
/// unusable fields simply come out as `None`.
pub fn normalize(raw: &Value) -> Token {
    Token {
        token_address: first_string(raw, ADDRESS_KEYS),
        token_name: first_string(raw, NAME_KEYS),
        token_ticker: first_string(raw, TICKER_KEYS),
        price_sol: first_f64(raw, PRICE_KEYS),
        market_cap_sol: first_f64(raw, MARKET_CAP_KEYS),
        volume_sol: first_f64(raw, VOLUME_KEYS),
        liquidity_sol: first_f64(raw, LIQUIDITY_KEYS),
        transaction_count: first_i64(raw, TX_COUNT_KEYS),
        price_1hr_change: first_f64(raw, CHANGE_1H_KEYS),
        price_24h_change: first_f64(raw, CHANGE_24H_KEYS),
        price_7d_change: first_f64(raw, CHANGE_7D_KEYS),
        protocol: first_string(raw, PROTOCOL_KEYS),
        raw_source: raw.clone(),
    }
}

/// Fold every record from every list, in list order then element order,
/// into one token per identity key. Later records override earlier ones
/// field by field; fields a later record lacks never erase what an earlier
/// one supplied. Records with an empty identity key are dropped. Output
/// order is first-seen order, so the result is deterministic for a given
/// input ordering, and intentionally dependent on it.
pub fn merge_token_lists(lists: &[Vec<Value>]) -> Vec<Token> {
    let mut by_key: HashMap<String, Token> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for list in lists {
        for raw in list {
            let norm = normalize(raw);
            let key = norm.identity_key();
            if key.is_empty() {
                continue;
            }
            match by_key.get_mut(&key) {
                Some(existing) => existing.merge_from(norm),
                None => {
                    by_key.insert(key.clone(), norm);
                    order.push(key);
                }
            }
        }
    }

    order.into_iter().filter_map(|k| by_key.remove(&k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_first_candidate_wins() {
        let raw = json!({
            "price": 1.0,
            "price_sol": 2.0,
            "priceUsd": "3.0",
        });
        assert_eq!(normalize(&raw).price_sol, Some(1.0));
    }

    #[test]
    fn test_normalize_nested_and_string_numbers() {
        let raw = json!({
            "token": { "address": "abc", "name": "Alpha", "symbol": "ALP" },
            "priceUsd": "0.0012",
            "dex": { "name": "Raydium CLMM" },
        });
        let token = normalize(&raw);
        assert_eq!(token.token_address.as_deref(), Some("abc"));
        assert_eq!(token.token_name.as_deref(), Some("Alpha"));
        assert_eq!(token.token_ticker.as_deref(), Some("ALP"));
        assert_eq!(token.price_sol, Some(0.0012));
        assert_eq!(token.protocol.as_deref(), Some("Raydium CLMM"));
    }

    #[test]
    fn test_normalize_preserves_raw_source() {
        let raw = json!({ "address": "abc", "some_vendor_field": 42 });
        let token = normalize(&raw);
        assert_eq!(token.raw_source["some_vendor_field"], 42);
    }

    #[test]
    fn test_merge_drops_empty_identity() {
        let lists = vec![vec![json!({ "price": 1.0 }), json!({ "address": "a" })]];
        let merged = merge_token_lists(&lists);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].token_address.as_deref(), Some("a"));
    }

    #[test]
    fn test_merge_later_source_overrides_defined_fields_only() {
        let first = vec![json!({ "address": "A", "volume": 100.0, "liquidity": 7.0 })];
        let second = vec![json!({ "address": "a", "volume": 250.0 })];
        let merged = merge_token_lists(&[first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].volume_sol, Some(250.0));
        // liquidity only came from the first source and must survive
        assert_eq!(merged[0].liquidity_sol, Some(7.0));
    }

    #[test]
    fn test_merge_is_idempotent_over_identical_lists() {
        let list = vec![
            json!({ "address": "a", "volume": 10.0 }),
            json!({ "symbol": "B", "volume": 20.0 }),
        ];
        let once = merge_token_lists(&[list.clone()]);
        let twice = merge_token_lists(&[list.clone(), list]);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_keys_are_case_insensitive() {
        let lists = vec![vec![
            json!({ "address": "ABC", "volume": 1.0 }),
            json!({ "address": "abc", "liquidity": 2.0 }),
        ]];
        let merged = merge_token_lists(&lists);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].volume_sol, Some(1.0));
        assert_eq!(merged[0].liquidity_sol, Some(2.0));
        // last writer wins on the fields it defines
        assert_eq!(merged[0].token_address.as_deref(), Some("abc"));
    }
}
