//! Per-source token-bucket rate limiting for the poll loop (spec.md §4.6:
//! "Per-adapter rate limits are respected by serializing polls per adapter
//! instance with a token bucket"). Spec.md §1 scopes out provider SDKs, so
//! there is no third-party GitHub/ADO rate-limit crate to reach for here —
//! this is a small internal type, as SPEC_FULL.md §5 calls for.

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

struct Bucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<(f64, Instant)>,
}

impl Bucket {
    fn new(tokens_per_interval: u32, interval: Duration) -> Self {
        let capacity = tokens_per_interval.max(1) as f64;
        let refill_per_second = capacity / interval.as_secs_f64().max(0.001);
        Self {
            capacity,
            refill_per_second,
            state: Mutex::new((capacity, Instant::now())),
        }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                let (tokens, last_refill) = *state;
                let elapsed = last_refill.elapsed().as_secs_f64();
                let refilled = (tokens + elapsed * self.refill_per_second).min(self.capacity);
                if refilled >= 1.0 {
                    *state = (refilled - 1.0, Instant::now());
                    None
                } else {
                    let shortfall = 1.0 - refilled;
                    *state = (refilled, Instant::now());
                    Some(Duration::from_secs_f64(shortfall / self.refill_per_second))
                }
            };
            match wait {
                None => return,
                Some(d) => sleep(d).await,
            }
        }
    }
}

/// One token bucket per configured `Source`, keyed by `source_id`.
pub struct RateLimiterRegistry {
    buckets: DashMap<i64, Bucket>,
    default_tokens_per_interval: u32,
    interval: Duration,
}

impl RateLimiterRegistry {
    pub fn new(default_tokens_per_interval: u32, interval: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            default_tokens_per_interval,
            interval,
        }
    }

    /// Waits until a poll slot is available for `source_id`.
    pub async fn acquire(&self, source_id: i64) {
        // DashMap's entry API holds a lock only long enough to construct the
        // bucket; the subsequent `acquire` await happens outside that lock.
        if !self.buckets.contains_key(&source_id) {
            self.buckets.insert(
                source_id,
                Bucket::new(self.default_tokens_per_interval, self.interval),
            );
        }
        let bucket_ref = self.buckets.get(&source_id);
        if let Some(bucket) = bucket_ref {
            bucket.acquire().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn exhausting_capacity_delays_the_next_acquire() {
        let registry = RateLimiterRegistry::new(2, Duration::from_millis(200));
        registry.acquire(1).await;
        registry.acquire(1).await;
        let start = Instant::now();
        registry.acquire(1).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn separate_sources_have_independent_buckets() {
        let registry = RateLimiterRegistry::new(1, Duration::from_secs(60));
        registry.acquire(1).await;
        let start = Instant::now();
        registry.acquire(2).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
