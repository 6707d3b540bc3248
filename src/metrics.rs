use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref FETCH_CALLS: Counter = Counter::new(
        "source_fetch_total",
        "Total upstream source fetch attempts"
    ).unwrap();

    pub static ref FETCH_ERRORS: Counter = Counter::new(
        "source_fetch_errors_total",
        "Upstream source fetches that failed after exhausting retries"
    ).unwrap();

    pub static ref CACHE_FALLBACKS: Counter = Counter::new(
        "cache_fallback_total",
        "Cache operations served by the in-memory fallback store"
    ).unwrap();

    pub static ref REFRESH_TICKS: Counter = Counter::new(
        "scheduler_refresh_ticks_total",
        "Completed scheduler refresh cycles"
    ).unwrap();

    pub static ref ACTIVE_SUBSCRIPTIONS: Gauge = Gauge::new(
        "active_subscriptions",
        "Currently registered live-feed subscriptions"
    ).unwrap();
}

pub fn init() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(FETCH_CALLS.clone()))?;
    REGISTRY.register(Box::new(FETCH_ERRORS.clone()))?;
    REGISTRY.register(Box::new(CACHE_FALLBACKS.clone()))?;
    REGISTRY.register(Box::new(REFRESH_TICKS.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))?;
    Ok(())
}
