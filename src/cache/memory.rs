use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

/// Small expiring string map used as the cache fallback tier. Entries are
/// reaped both lazily on read and by a deferred delete task scheduled at
/// write time, so a key never outlives its TTL by more than a scheduler
/// wakeup. `ttl_seconds <= 0` stores without expiry.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) => {
                if let Some(expires_at) = entry.expires_at {
                    if Instant::now() >= expires_at {
                        entries.remove(key);
                        return None;
                    }
                }
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    pub async fn set(&self, key: String, value: String, ttl_seconds: i64) {
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds as u64))
        } else {
            None
        };
        {
            let mut entries = self.entries.lock().await;
            entries.insert(key.clone(), MemoryEntry { value, expires_at });
        }

        if let Some(deadline) = expires_at {
            let entries = Arc::clone(&self.entries);
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let mut entries = entries.lock().await;
                // only remove if the entry wasn't refreshed with a later TTL
                let due = entries
                    .get(&key)
                    .and_then(|e| e.expires_at)
                    .map(|at| Instant::now() >= at)
                    .unwrap_or(false);
                if due {
                    entries.remove(&key);
                }
            });
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
