use crate::error::{Error, Result};
use crate::metrics::{FETCH_CALLS, FETCH_ERRORS};
use log::warn;
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub mod dexscreener;
pub mod geckoterminal;
pub mod synthetic;

pub use dexscreener::DexScreenerClient;
pub use geckoterminal::GeckoTerminalClient;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Build the shared upstream HTTP client. Disabling certificate
/// verification is an explicit opt-in for broken corporate proxies and
/// test rigs; it is loudly logged because it weakens transport security.
pub fn build_http_client(timeout_secs: u64, disable_tls_verify: bool) -> Result<Client> {
    let mut builder = Client::builder().timeout(Duration::from_secs(timeout_secs));
    if disable_tls_verify {
        warn!("TLS certificate verification is DISABLED for upstream requests");
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(Error::from)
}

/// Backoff before retry `attempt` (counted from 1): `2^attempt * 200ms`
/// plus up to 100ms of jitter so parallel fetchers don't retry in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..100u64);
    Duration::from_millis(2u64.pow(attempt) * 200 + jitter)
}

/// GET `url` and parse the JSON body, retrying transient failures
/// (connection errors, timeouts, non-2xx, unparseable bodies) up to
/// `max_retries` times beyond the initial attempt.
pub async fn http_get_with_retry(client: &Client, url: &str, max_retries: u32) -> Result<Value> {
    let mut attempt: u32 = 0;
    loop {
        FETCH_CALLS.inc();
        let err = match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    match resp.json::<Value>().await {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            Error::ApiInvalidFormat(format!("{}: bad JSON body: {}", url, e))
                        }
                    }
                } else {
                    Error::ApiError(format!("{} returned status {}", url, status))
                }
            }
            Err(e) => Error::from(e),
        };

        attempt += 1;
        if attempt > max_retries {
            FETCH_ERRORS.inc();
            return Err(err);
        }
        let delay = backoff_delay(attempt);
        warn!(
            "fetch attempt {}/{} for {} failed: {}; retrying in {}ms",
            attempt,
            max_retries,
            url,
            err,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}
