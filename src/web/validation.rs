use crate::error::{Error, Result};
use crate::query::{TokenFilters, TokenQuery};
use std::collections::HashMap;

const MAX_LIMIT: usize = 100;

/// Parse and clamp `/tokens` query parameters. Limits are clamped into
/// [1, 100] here so the query engine never has to reject anything;
/// non-numeric numbers are the caller's error.
pub fn parse_tokens_query(params: &HashMap<String, String>) -> Result<TokenQuery> {
    let limit = match params.get("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| Error::InvalidInput(format!("invalid limit: {}", raw)))?,
        None => crate::query::DEFAULT_LIMIT,
    };
    let limit = limit.clamp(1, MAX_LIMIT);

    let cursor = params.get("cursor").cloned().unwrap_or_else(|| "0".to_string());
    if cursor.parse::<usize>().is_err() {
        return Err(Error::InvalidInput(format!("invalid cursor: {}", cursor)));
    }

    let min_volume = match params.get("minVolume") {
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| Error::InvalidInput(format!("invalid minVolume: {}", raw)))?,
        ),
        None => None,
    };

    Ok(TokenQuery {
        filters: TokenFilters {
            period: Some(
                params
                    .get("period")
                    .cloned()
                    .unwrap_or_else(|| "24h".to_string()),
            ),
            min_volume,
            protocol: params.get("protocol").cloned(),
            q: params.get("q").cloned(),
        },
        sort_by: Some(
            params
                .get("sortBy")
                .cloned()
                .unwrap_or_else(|| "volume".to_string()),
        ),
        limit: Some(limit),
        cursor: Some(cursor),
    })
}
