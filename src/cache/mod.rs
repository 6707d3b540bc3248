use crate::error::Result;
use crate::metrics::CACHE_FALLBACKS;
use log::{debug, warn};
use redis::aio::MultiplexedConnection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod memory;

pub use memory::MemoryCache;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Best-effort key/value store: redis primary with a transparent in-process
/// fallback. Primary trouble is logged and absorbed; a cache call never
/// fails the request that made it. Every call re-attempts the primary
/// connection when it is down, so the store heals itself once redis
/// comes back.
pub struct CacheStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    fallback: MemoryCache,
}

impl CacheStore {
    /// `redis_url` is validated here but not dialed; the first cache call
    /// establishes the connection.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            fallback: MemoryCache::new(),
        })
    }

    async fn primary(&self) -> Option<MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            match tokio::time::timeout(
                CONNECT_TIMEOUT,
                self.client.get_multiplexed_async_connection(),
            )
            .await
            {
                Ok(Ok(conn)) => {
                    debug!("connected to redis primary");
                    *guard = Some(conn);
                }
                Ok(Err(e)) => debug!("redis connect failed: {}", e),
                Err(_) => debug!("redis connect timed out"),
            }
        }
        guard.clone()
    }

    async fn drop_primary(&self) {
        *self.conn.lock().await = None;
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(mut conn) = self.primary().await {
            match redis::cmd("GET")
                .arg(key)
                .query_async::<_, Option<String>>(&mut conn)
                .await
            {
                Ok(Some(serialized)) => return serde_json::from_str(&serialized).ok(),
                Ok(None) => return None,
                Err(e) => {
                    warn!("redis GET {} failed, falling back to memory: {}", key, e);
                    self.drop_primary().await;
                }
            }
        }

        CACHE_FALLBACKS.inc();
        let serialized = self.fallback.get(key).await?;
        serde_json::from_str(&serialized).ok()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: i64) {
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!("cache set {} skipped, value not serializable: {}", key, e);
                return;
            }
        };

        if let Some(mut conn) = self.primary().await {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(&serialized);
            if ttl_seconds > 0 {
                cmd.arg("EX").arg(ttl_seconds);
            }
            match cmd.query_async::<_, ()>(&mut conn).await {
                Ok(()) => return,
                Err(e) => {
                    warn!("redis SET {} failed, falling back to memory: {}", key, e);
                    self.drop_primary().await;
                }
            }
        }

        CACHE_FALLBACKS.inc();
        self.fallback.set(key.to_string(), serialized, ttl_seconds).await;
    }
}
