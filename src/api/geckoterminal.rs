use crate::api::{self, synthetic};
use crate::error::Result;
use reqwest::Client;
use serde_json::Value;

const API_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

pub struct GeckoTerminalClient {
    client: Client,
    base_url: String,
    mock_api: bool,
}

impl GeckoTerminalClient {
    pub fn new(client: Client, mock_api: bool) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
            mock_api,
        }
    }

    /// Fetch the Solana network token listing. Returns the raw response
    /// envelope; the aggregator unwraps it.
    pub async fn fetch_tokens(&self) -> Result<Value> {
        if self.mock_api {
            return Ok(Value::Array(synthetic::mock_tokens(30)));
        }
        let url = format!("{}/networks/solana/tokens", self.base_url);
        api::http_get_with_retry(&self.client, &url, api::DEFAULT_MAX_RETRIES).await
    }
}
