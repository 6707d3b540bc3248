use crate::api::{self, synthetic};
use crate::error::{Error, Result};
use reqwest::{Client, Url};
use serde_json::Value;

const API_BASE_URL: &str = "https://api.dexscreener.com";
/// Text search is noisier and slower upstream, so it gets a smaller
/// retry budget than the by-address lookup.
const SEARCH_MAX_RETRIES: u32 = 2;

pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    mock_api: bool,
}

impl DexScreenerClient {
    pub fn new(client: Client, mock_api: bool) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            mock_api,
        }
    }

    /// Fetch pair data for a token address (`0x`-prefixed) or a free-text
    /// search query. Returns the raw response envelope; the aggregator is
    /// responsible for digging the token array out of it.
    pub async fn fetch_tokens(&self, address_or_query: &str) -> Result<Value> {
        if self.mock_api {
            return Ok(Value::Array(synthetic::mock_tokens(25)));
        }

        let looks_like_address = address_or_query
            .get(..2)
            .map(|prefix| prefix.eq_ignore_ascii_case("0x"))
            .unwrap_or(false);

        if looks_like_address {
            let url = format!("{}/latest/dex/tokens/{}", self.base_url, address_or_query);
            api::http_get_with_retry(&self.client, &url, api::DEFAULT_MAX_RETRIES).await
        } else {
            let url = Url::parse_with_params(
                &format!("{}/latest/dex/search", self.base_url),
                &[("q", address_or_query)],
            )
            .map_err(|e| Error::InternalError(format!("bad search url: {}", e)))?;
            api::http_get_with_retry(&self.client, url.as_str(), SEARCH_MAX_RETRIES).await
        }
    }
}
