use crate::aggregator::TokenAggregator;
use crate::error::Error;
use crate::query::apply_filters_and_sort;
use crate::subscriptions::SubscriptionRegistry;
use crate::web::validation::parse_tokens_query;
use crate::web::ws::{self, WsHub};
use log::{error, info};
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

pub struct WebServer {
    aggregator: Arc<TokenAggregator>,
    registry: Arc<SubscriptionRegistry>,
    hub: Arc<WsHub>,
}

impl WebServer {
    pub fn new(
        aggregator: Arc<TokenAggregator>,
        registry: Arc<SubscriptionRegistry>,
        hub: Arc<WsHub>,
    ) -> Self {
        Self {
            aggregator,
            registry,
            hub,
        }
    }

    pub async fn start(&self, host: &str, port: u16) -> anyhow::Result<()> {
        let addr: IpAddr = host
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid listen host: {}", host))?;
        info!("Starting web server on {}:{}", host, port);

        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&json!({
                    "status": "ok",
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }))
            });

        let tokens = warp::path("tokens")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<HashMap<String, String>>())
            .and(with(self.aggregator.clone()))
            .and_then(get_tokens);

        let debug_fetch = warp::path!("debug" / "fetch")
            .and(warp::get())
            .and(with(self.aggregator.clone()))
            .and_then(debug_fetch);

        let websocket = warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and(with(self.hub.clone()))
            .and(with(self.registry.clone()))
            .and(with(self.aggregator.clone()))
            .map(
                |upgrade: warp::ws::Ws,
                 hub: Arc<WsHub>,
                 registry: Arc<SubscriptionRegistry>,
                 aggregator: Arc<TokenAggregator>| {
                    upgrade.on_upgrade(move |socket| {
                        ws::client_connected(socket, hub, registry, aggregator)
                    })
                },
            );

        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST"])
            .allow_headers(vec!["content-type"]);

        let routes = health.or(tokens).or(debug_fetch).or(websocket).with(cors);
        warp::serve(routes).run((addr, port)).await;
        Ok(())
    }
}

fn with<T: Clone + Send + Sync>(
    value: T,
) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

async fn get_tokens(
    params: HashMap<String, String>,
    aggregator: Arc<TokenAggregator>,
) -> Result<impl warp::Reply, Infallible> {
    let query = match parse_tokens_query(&params) {
        Ok(query) => query,
        Err(Error::InvalidInput(message)) => {
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": message })),
                StatusCode::BAD_REQUEST,
            ));
        }
        Err(e) => {
            error!("tokens query parse error: {}", e);
            return Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": "failed" })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    match aggregator.get_tokens(false).await {
        Ok(tokens) => {
            let page = apply_filters_and_sort(&tokens, &query);
            Ok(warp::reply::with_status(
                warp::reply::json(&page),
                StatusCode::OK,
            ))
        }
        Err(e) => {
            error!("tokens request failed: {}", e);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({ "error": "failed" })),
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn debug_fetch(
    aggregator: Arc<TokenAggregator>,
) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&aggregator.debug_fetch().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::config::Config;

    fn mock_aggregator() -> Arc<TokenAggregator> {
        let mut config = Config::default();
        config.sources.mock_api = true;
        config.cache.redis_url = "redis://127.0.0.1:1".to_string();
        let cache = Arc::new(CacheStore::new(&config.cache.redis_url).unwrap());
        Arc::new(TokenAggregator::new(cache, &config).unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_get_tokens_handler_serves_page() {
        let reply = get_tokens(params(&[("limit", "5")]), mock_aggregator())
            .await
            .unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_tokens_rejects_bad_cursor() {
        let reply = get_tokens(params(&[("cursor", "abc")]), mock_aggregator())
            .await
            .unwrap();
        let response = warp::reply::Reply::into_response(reply);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
