use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical token record merged from all upstream sources.
///
/// Every field is optional because no single source supplies them all; the
/// aggregator fills in whatever each source knows and later sources override
/// earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub token_address: Option<String>,
    pub token_name: Option<String>,
    pub token_ticker: Option<String>,
    pub price_sol: Option<f64>,
    pub market_cap_sol: Option<f64>,
    pub volume_sol: Option<f64>,
    pub liquidity_sol: Option<f64>,
    pub transaction_count: Option<i64>,
    pub price_1hr_change: Option<f64>,
    pub price_24h_change: Option<f64>,
    pub price_7d_change: Option<f64>,
    pub protocol: Option<String>,
    /// Original upstream record, kept verbatim for debugging.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub raw_source: Value,
}

impl Token {
    /// Lowercase key used to deduplicate and merge records across sources.
    /// Address wins over ticker, ticker over name; a token with none of the
    /// three yields an empty key and is dropped by the merge.
    pub fn identity_key(&self) -> String {
        self.token_address
            .as_deref()
            .or(self.token_ticker.as_deref())
            .or(self.token_name.as_deref())
            .unwrap_or("")
            .to_lowercase()
    }

    /// Overlay `other` on top of `self`: only fields `other` actually has
    /// overwrite; missing fields never erase existing values.
    pub fn merge_from(&mut self, other: Token) {
        if other.token_address.is_some() {
            self.token_address = other.token_address;
        }
        if other.token_name.is_some() {
            self.token_name = other.token_name;
        }
        if other.token_ticker.is_some() {
            self.token_ticker = other.token_ticker;
        }
        if other.price_sol.is_some() {
            self.price_sol = other.price_sol;
        }
        if other.market_cap_sol.is_some() {
            self.market_cap_sol = other.market_cap_sol;
        }
        if other.volume_sol.is_some() {
            self.volume_sol = other.volume_sol;
        }
        if other.liquidity_sol.is_some() {
            self.liquidity_sol = other.liquidity_sol;
        }
        if other.transaction_count.is_some() {
            self.transaction_count = other.transaction_count;
        }
        if other.price_1hr_change.is_some() {
            self.price_1hr_change = other.price_1hr_change;
        }
        if other.price_24h_change.is_some() {
            self.price_24h_change = other.price_24h_change;
        }
        if other.price_7d_change.is_some() {
            self.price_7d_change = other.price_7d_change;
        }
        if other.protocol.is_some() {
            self.protocol = other.protocol;
        }
        if !other.raw_source.is_null() {
            self.raw_source = other.raw_source;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_address() {
        let token = Token {
            token_address: Some("So11111111111111111111111111111111111111112".to_string()),
            token_ticker: Some("SOL".to_string()),
            token_name: Some("Wrapped SOL".to_string()),
            ..Token::default()
        };
        assert_eq!(
            token.identity_key(),
            "so11111111111111111111111111111111111111112"
        );
    }

    #[test]
    fn test_identity_key_falls_back_to_ticker_then_name() {
        let token = Token {
            token_ticker: Some("BONK".to_string()),
            token_name: Some("Bonk".to_string()),
            ..Token::default()
        };
        assert_eq!(token.identity_key(), "bonk");

        let token = Token {
            token_name: Some("Nameless Coin".to_string()),
            ..Token::default()
        };
        assert_eq!(token.identity_key(), "nameless coin");

        assert_eq!(Token::default().identity_key(), "");
    }

    #[test]
    fn test_merge_from_keeps_existing_when_other_is_missing() {
        let mut base = Token {
            token_address: Some("abc".to_string()),
            price_sol: Some(1.5),
            volume_sol: Some(100.0),
            ..Token::default()
        };
        let overlay = Token {
            token_address: Some("abc".to_string()),
            price_sol: Some(2.0),
            ..Token::default()
        };
        base.merge_from(overlay);
        assert_eq!(base.price_sol, Some(2.0));
        // volume was absent from the overlay and must survive
        assert_eq!(base.volume_sol, Some(100.0));
    }
}
