use std::{
    net::SocketAddr,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use crate::{config::RateLimitConfig, error::AuthError, state::AppState};

/// Fixed-window request counter keyed by source address and path.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, (Instant, u32)>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests: cfg.max_requests,
            window: Duration::from_secs(cfg.window_secs),
        }
    }

    /// Records one request for `key`; `false` once the quota is spent.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.windows.entry(key.to_string()).or_insert((now, 0));
        let (started, count) = entry.value_mut();
        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }
        if *count >= self.max_requests {
            return false;
        }
        *count += 1;
        true
    }

    /// Drops windows that have already ended.
    pub fn purge(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, (started, _)| now.duration_since(*started) < self.window);
    }
}

fn client_key(peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

pub async fn limit_by_client(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(peer.map(|ConnectInfo(addr)| addr), req.headers());
    let key = format!("{client} {}", req.uri().path());
    if !state.limiter.check(&key) {
        warn!(%client, path = %req.uri().path(), "rate limit exceeded");
        return AuthError::RateLimited.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests: max,
            window_secs: secs,
        })
    }

    #[test]
    fn quota_is_per_key_and_resets_with_window() {
        let l = limiter(3, 60);
        let t0 = Instant::now();
        for i in 1..=3 {
            assert!(l.check_at("1.2.3.4", t0), "request {i} should pass");
        }
        assert!(!l.check_at("1.2.3.4", t0));
        assert!(l.check_at("5.6.7.8", t0));
        assert!(l.check_at("1.2.3.4", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn key_prefers_peer_then_forwarded_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(None, &headers), "unknown");
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_key(None, &headers), "10.0.0.1");
        let peer: SocketAddr = "192.168.1.9:5000".parse().unwrap();
        assert_eq!(client_key(Some(peer), &headers), "192.168.1.9");
    }
}
