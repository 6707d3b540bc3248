use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Fixed seed so offline runs and tests see identical data every call.
const MOCK_SEED: u64 = 0x746f_6b65_6e73;

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Deterministic stand-in for an upstream token listing, in canonical field
/// names so it flows through normalization unchanged. Same contract as a
/// real source response: a JSON array of token records.
pub fn mock_tokens(n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(MOCK_SEED);
    let now = Utc::now().timestamp_millis();
    let mut tokens = Vec::with_capacity(n);
    for i in 0..n {
        let pct_1h = (rng.gen::<f64>() - 0.5) * 50.0;
        let pct_24h = (rng.gen::<f64>() - 0.5) * 100.0;
        let pct_7d = (rng.gen::<f64>() - 0.5) * 300.0;
        tokens.push(json!({
            "token_address": format!("MOCK{}", i),
            "token_name": format!("Mock Token {}", i),
            "token_ticker": format!("MCK{}", i),
            "price_sol": round_to(rng.gen::<f64>() * 0.001, 12),
            "market_cap_sol": round_to(rng.gen::<f64>() * 1000.0, 4),
            "volume_sol": round_to(rng.gen::<f64>() * 500.0, 4),
            "liquidity_sol": round_to(rng.gen::<f64>() * 200.0, 4),
            "transaction_count": rng.gen_range(0..10_000),
            "price_1hr_change": round_to(pct_1h, 4),
            "price_24h_change": round_to(pct_24h, 4),
            "price_7d_change": round_to(pct_7d, 4),
            "protocol": if i % 2 == 0 { "Raydium CLMM" } else { "Orca" },
            "_mock_ts": now,
        }));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_tokens_are_deterministic() {
        let a = mock_tokens(10);
        let b = mock_tokens(10);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x["token_address"], y["token_address"]);
            assert_eq!(x["price_sol"], y["price_sol"]);
            assert_eq!(x["volume_sol"], y["volume_sol"]);
        }
    }

    #[test]
    fn test_mock_tokens_alternate_protocols() {
        let tokens = mock_tokens(4);
        assert_eq!(tokens[0]["protocol"], "Raydium CLMM");
        assert_eq!(tokens[1]["protocol"], "Orca");
        assert_eq!(tokens[2]["protocol"], "Raydium CLMM");
    }
}
