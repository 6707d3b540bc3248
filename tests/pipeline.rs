use serde_json::json;
use std::sync::Arc;

use token_radar::aggregator::{merge_token_lists, TokenAggregator};
use token_radar::cache::CacheStore;
use token_radar::config::Config;
use token_radar::models::Token;
use token_radar::query::{apply_filters_and_sort, token_matches_filters, TokenFilters, TokenQuery};
use token_radar::scheduler::compute_diffs;

fn seeded_snapshot() -> Vec<Token> {
    merge_token_lists(&[vec![
        json!({
            "token_address": "aaa",
            "token_name": "Alpha",
            "token_ticker": "ALP",
            "price_sol": 1.0,
            "volume_sol": 300.0,
            "protocol": "Raydium CLMM",
        }),
        json!({
            "token_address": "bbb",
            "token_name": "Beta",
            "token_ticker": "BET",
            "price_sol": 2.0,
            "volume_sol": 100.0,
            "protocol": "Orca",
        }),
        json!({
            "token_address": "ccc",
            "token_name": "Gamma",
            "token_ticker": "GAM",
            "price_sol": 3.0,
            "volume_sol": 200.0,
            "protocol": "Raydium CLMM",
        }),
    ]])
}

fn page_query(limit: usize, cursor: &str) -> TokenQuery {
    TokenQuery {
        filters: TokenFilters::default(),
        sort_by: Some("volume".to_string()),
        limit: Some(limit),
        cursor: Some(cursor.to_string()),
    }
}

#[test]
fn seeded_snapshot_paginates_by_volume() {
    let tokens = seeded_snapshot();
    assert_eq!(tokens.len(), 3);

    // first page: top two by volume, with a cursor pointing at the rest
    let page = apply_filters_and_sort(&tokens, &page_query(2, "0"));
    assert_eq!(page.total, 3);
    let addresses: Vec<&str> = page
        .items
        .iter()
        .map(|t| t.token_address.as_deref().unwrap())
        .collect();
    assert_eq!(addresses, vec!["aaa", "ccc"]);
    assert_eq!(page.next_cursor.as_deref(), Some("2"));

    // second page: the remaining token, cursor exhausted
    let page = apply_filters_and_sort(&tokens, &page_query(2, "2"));
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].token_address.as_deref(), Some("bbb"));
    assert!(page.next_cursor.is_none());
}

#[test]
fn heterogeneous_sources_merge_into_one_view() {
    // the same token as each upstream shapes it, plus one source-unique token
    let geckoterminal_like = vec![json!({
        "id": "mint111",
        "name": "Alpha",
        "symbol": "ALP",
        "price": 1.0,
        "volume": 50.0,
    })];
    let dexscreener_like = vec![
        json!({
            "token": { "address": "MINT111", "name": "Alpha", "symbol": "ALP" },
            "priceUsd": "1.25",
            "volume_24h": 80.0,
            "dex": { "name": "Raydium CLMM" },
        }),
        json!({
            "token": { "address": "mint222", "name": "Beta", "symbol": "BET" },
            "priceUsd": "0.5",
            "volume_24h": 10.0,
            "dex": { "name": "Orca" },
        }),
    ];

    let merged = merge_token_lists(&[geckoterminal_like, dexscreener_like]);
    assert_eq!(merged.len(), 2);

    let alpha = merged
        .iter()
        .find(|t| t.token_name.as_deref() == Some("Alpha"))
        .unwrap();
    // the later source overrode price and volume and contributed a protocol
    assert_eq!(alpha.price_sol, Some(1.25));
    assert_eq!(alpha.volume_sol, Some(80.0));
    assert_eq!(alpha.protocol.as_deref(), Some("Raydium CLMM"));

    let page = apply_filters_and_sort(
        &merged,
        &TokenQuery {
            filters: TokenFilters {
                protocol: Some("orca".to_string()),
                ..TokenFilters::default()
            },
            ..TokenQuery::default()
        },
    );
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].token_name.as_deref(), Some("Beta"));
}

#[test]
fn diff_events_reach_only_matching_subscribers() {
    let prev = seeded_snapshot();
    let mut fresh = seeded_snapshot();
    // Alpha (Raydium) moves 1%; Beta (Orca) stays put
    fresh[0].price_sol = Some(1.01);

    let diffs = compute_diffs(&prev, &fresh);
    assert_eq!(diffs.price_updates.len(), 1);
    let update = &diffs.price_updates[0];
    assert_eq!(update.token_address.as_deref(), Some("aaa"));
    assert_eq!(update.price_change_pct, Some(1.0));

    let raydium_filter = TokenFilters {
        protocol: Some("Raydium CLMM".to_string()),
        ..TokenFilters::default()
    };
    let orca_filter = TokenFilters {
        protocol: Some("Orca".to_string()),
        ..TokenFilters::default()
    };

    let moved = fresh
        .iter()
        .find(|t| t.token_address.as_deref() == update.token_address.as_deref())
        .unwrap();
    assert!(token_matches_filters(moved, &raydium_filter));
    assert!(!token_matches_filters(moved, &orca_filter));
}

#[tokio::test]
async fn aggregator_serves_and_caches_mock_sources() {
    let mut config = Config::default();
    config.sources.mock_api = true;
    // unreachable primary forces the in-memory cache tier
    config.cache.redis_url = "redis://127.0.0.1:1".to_string();

    let cache = Arc::new(CacheStore::new(&config.cache.redis_url).unwrap());
    let aggregator = TokenAggregator::new(cache, &config).unwrap();

    let refreshed = aggregator.get_tokens(true).await.unwrap();
    assert!(!refreshed.is_empty());

    // a cached read returns the same snapshot without touching sources
    let cached = aggregator.get_tokens(false).await.unwrap();
    assert_eq!(refreshed.len(), cached.len());

    let page = apply_filters_and_sort(
        &cached,
        &TokenQuery {
            limit: Some(5),
            ..TokenQuery::default()
        },
    );
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.next_cursor.as_deref(), Some("5"));
    assert!(page.total >= 25);
}
