use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;

use crate::error::Error;

const SHARDS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Per-IP fixed-window counters spread over a few mutex-protected shards.
/// Each shard holds at most `max_entries / SHARDS` keys; expired windows are
/// dropped by the sweeper or when a shard fills up.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limit: u32,
    window: Duration,
    shard_capacity: usize,
    shards: Vec<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                limit: limit.max(1),
                window,
                shard_capacity: (max_entries / SHARDS).max(1),
                shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            }),
        }
    }

    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let inner = &self.inner;
        let mut shard = self.shard(key);

        if let Some(entry) = shard.get_mut(key) {
            if now.duration_since(entry.start) >= inner.window {
                *entry = Window { start: now, count: 0 };
            }
            if entry.count >= inner.limit {
                return false;
            }
            entry.count += 1;
            return true;
        }

        if shard.len() >= inner.shard_capacity {
            shard.retain(|_, w| now.duration_since(w.start) < inner.window);
        }
        if shard.len() >= inner.shard_capacity {
            let oldest = shard
                .iter()
                .min_by_key(|(_, w)| w.start)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                shard.remove(&oldest);
            }
        }
        shard.insert(key.to_string(), Window { start: now, count: 1 });
        true
    }

    /// Drops every expired window and returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let window = self.inner.window;
        self.inner
            .shards
            .iter()
            .map(|shard| {
                let mut shard = lock(shard);
                let before = shard.len();
                shard.retain(|_, w| now.duration_since(w.start) < window);
                before - shard.len()
            })
            .sum()
    }

    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|s| lock(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.len(), "Rate limit entries swept");
                }
            }
        })
    }

    fn shard(&self, key: &str) -> MutexGuard<'_, HashMap<String, Window>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.inner.shards.len();
        lock(&self.inner.shards[idx])
    }
}

// A panic while holding a shard leaves only counters behind; keep using them.
fn lock(shard: &Mutex<HashMap<String, Window>>) -> MutexGuard<'_, HashMap<String, Window>> {
    shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !limiter.check(&ip) {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        return Error::RateLimited.into_response();
    }
    next.run(req).await
}

/// First `X-Forwarded-For` hop, then the socket peer address.
fn client_ip(req: &Request<Body>) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60), 100);
        let now = Instant::now();
        assert!(limiter.check_at("1.1.1.1", now));
        assert!(limiter.check_at("1.1.1.1", now));
        assert!(limiter.check_at("1.1.1.1", now));
        assert!(!limiter.check_at("1.1.1.1", now));
        assert!(limiter.check_at("2.2.2.2", now));
    }

    #[test]
    fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10), 100);
        let now = Instant::now();
        assert!(limiter.check_at("ip", now));
        assert!(!limiter.check_at("ip", now + Duration::from_secs(5)));
        assert!(limiter.check_at("ip", now + Duration::from_secs(10)));
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10), 1000);
        let now = Instant::now();
        for i in 0..20 {
            limiter.check_at(&format!("10.0.0.{}", i), now);
        }
        limiter.check_at("fresh", now + Duration::from_secs(8));
        assert_eq!(limiter.len(), 21);

        let removed = limiter.sweep_at(now + Duration::from_secs(11));
        assert_eq!(removed, 20);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn entries_stay_bounded() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), SHARDS * 2);
        let now = Instant::now();
        for i in 0..500 {
            assert!(limiter.check_at(&format!("client-{}", i), now + Duration::from_millis(i)));
        }
        assert!(limiter.len() <= SHARDS * 2);
    }

    #[test]
    fn forwarded_header_wins() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare), "unknown");
    }
}
