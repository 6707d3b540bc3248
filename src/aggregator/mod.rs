use crate::api::{self, DexScreenerClient, GeckoTerminalClient};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::models::Token;
use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::Arc;

pub mod normalize;

pub use normalize::{merge_token_lists, normalize};

/// Versioned so a schema change can't deserialize stale snapshots.
pub const CACHE_KEY: &str = "agg:tokens:v1";

/// Default free-text query sent to DexScreener when no address is given.
const DEXSCREENER_QUERY: &str = "solana";

/// Pulls token listings from every configured source, merges them into one
/// snapshot and keeps that snapshot cached. Sources are fetched
/// concurrently and failures degrade to an empty contribution; merge
/// precedence is the fixed source order below, never arrival order.
pub struct TokenAggregator {
    cache: Arc<CacheStore>,
    geckoterminal: GeckoTerminalClient,
    dexscreener: DexScreenerClient,
    cache_ttl: i64,
}

impl TokenAggregator {
    pub fn new(cache: Arc<CacheStore>, config: &Config) -> Result<Self> {
        let client = api::build_http_client(
            config.sources.request_timeout_secs,
            config.sources.disable_tls_verify,
        )?;
        Ok(Self {
            cache,
            geckoterminal: GeckoTerminalClient::new(client.clone(), config.sources.mock_api),
            dexscreener: DexScreenerClient::new(client, config.sources.mock_api),
            cache_ttl: config.cache.ttl_seconds,
        })
    }

    /// Current merged snapshot. Serves from cache unless `force_refresh`;
    /// on a miss or forced refresh, fans out to all sources, merges, and
    /// re-caches. A source failing only shrinks the merge.
    pub async fn get_tokens(&self, force_refresh: bool) -> Result<Vec<Token>> {
        if !force_refresh {
            if let Some(tokens) = self.cache.get::<Vec<Token>>(CACHE_KEY).await {
                debug!("serving {} tokens from cache", tokens.len());
                return Ok(tokens);
            }
        }

        let (gecko_resp, dexs_resp) = tokio::join!(
            self.geckoterminal.fetch_tokens(),
            self.dexscreener.fetch_tokens(DEXSCREENER_QUERY),
        );

        // merge order is declaration order here, so DexScreener fields win
        // on tokens both sources know
        let mut lists: Vec<Vec<Value>> = Vec::new();
        match gecko_resp {
            Ok(value) => match extract_token_list(&value) {
                Some(list) => lists.push(list),
                None => warn!("geckoterminal response contained no token array"),
            },
            Err(e) => warn!("geckoterminal fetch failed: {}", e),
        }
        match dexs_resp {
            Ok(value) => match extract_token_list(&value) {
                Some(list) => lists.push(list),
                None => warn!("dexscreener response contained no token array"),
            },
            Err(e) => warn!("dexscreener fetch failed: {}", e),
        }

        let merged = merge_token_lists(&lists);
        debug!("merged {} tokens from {} source lists", merged.len(), lists.len());
        self.cache.set(CACHE_KEY, &merged, self.cache_ttl).await;
        Ok(merged)
    }

    /// Raw per-source responses for the `/debug/fetch` route; fetch errors
    /// are reported inline instead of failing the call.
    pub async fn debug_fetch(&self) -> Value {
        let (gecko_resp, dexs_resp) = tokio::join!(
            self.geckoterminal.fetch_tokens(),
            self.dexscreener.fetch_tokens(DEXSCREENER_QUERY),
        );
        json!({
            "gecko": summarize(gecko_resp),
            "dexscreener": summarize(dexs_resp),
        })
    }
}

fn summarize(resp: Result<Value>) -> Value {
    match resp {
        Ok(value) => match value.as_array() {
            Some(arr) => json!({
                "len": arr.len(),
                "sample": arr.iter().take(3).cloned().collect::<Vec<_>>(),
            }),
            None => value,
        },
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// Dig the actual record array out of a source's response envelope. Tries
/// the value itself, then the usual wrapper members, then the doubly
/// nested `data.tokens` shape. `None` means the source contributes
/// nothing this cycle.
pub fn extract_token_list(value: &Value) -> Option<Vec<Value>> {
    if let Some(arr) = value.as_array() {
        return Some(arr.clone());
    }
    for key in ["data", "results", "tokens", "pairs"] {
        if let Some(arr) = value.get(key).and_then(Value::as_array) {
            return Some(arr.to_vec());
        }
    }
    value
        .get("data")
        .and_then(|d| d.get("tokens"))
        .and_then(Value::as_array)
        .map(|arr| arr.to_vec())
}
