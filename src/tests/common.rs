use crate::config::Config;
use crate::models::Token;

/// Build a token with the fields most tests care about; everything else
/// stays unset.
pub fn make_token(
    address: &str,
    name: &str,
    ticker: &str,
    price_sol: f64,
    volume_sol: f64,
    protocol: &str,
) -> Token {
    Token {
        token_address: Some(address.to_string()),
        token_name: Some(name.to_string()),
        token_ticker: Some(ticker.to_string()),
        price_sol: Some(price_sol),
        volume_sol: Some(volume_sol),
        protocol: Some(protocol.to_string()),
        ..Token::default()
    }
}

/// Config for offline tests: synthetic sources, unreachable redis so the
/// cache exercises its memory fallback.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.sources.mock_api = true;
    config.cache.redis_url = "redis://127.0.0.1:1".to_string();
    config.scheduler.interval_ms = 100;
    config
}
