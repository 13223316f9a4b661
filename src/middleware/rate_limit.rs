//! Rate limiting middleware.
//!
//! In-memory fixed-window limiter keyed by client IP, applied to the
//! credential endpoints.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
    /// Extra requests tolerated above `max_requests` before rejecting.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
            burst: 5,
        }
    }
}

/// Rate limiter state tracking requests per IP.
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, RateLimitEntry>>>,
}

struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum RateLimitResult {
    Allowed,
    BurstUsed,
    Exceeded { retry_after: Duration },
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn check(&self, ip: IpAddr) -> RateLimitResult {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> RateLimitResult {
        let mut state = self.state.lock();

        let entry = state.entry(ip).or_insert(RateLimitEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);

        let limit = self.config.max_requests.saturating_add(self.config.burst);
        if entry.count > limit {
            let reset_at = entry.window_start + self.config.window;
            RateLimitResult::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else if entry.count > self.config.max_requests {
            RateLimitResult::BurstUsed
        } else {
            RateLimitResult::Allowed
        }
    }

    /// Drop entries whose window has long passed (call from a background task).
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.config.window;

        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.lock().len()
    }
}

/// Rate limiting middleware function.
///
/// Without connection info (e.g. in-process router tests) every request is
/// counted against the unspecified address.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitLayer>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(ip) {
        RateLimitResult::Allowed | RateLimitResult::BurstUsed => next.run(request).await,
        RateLimitResult::Exceeded { retry_after } => {
            // round up so clients never retry inside the window
            let retry_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);

            warn!(
                ip = %ip,
                path = %request.uri().path(),
                retry_after_secs = retry_secs,
                "🚦 Rate limit exceeded"
            );

            let body = serde_json::json!({
                "error": "rate_limited",
                "message": "Too many requests. Please slow down.",
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, burst: u32) -> RateLimitLayer {
        RateLimitLayer::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            burst,
        })
    }

    #[test]
    fn test_rate_limit_allows_under_limit() {
        let limiter = limiter(10, 5);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..10 {
            assert_eq!(limiter.check(ip), RateLimitResult::Allowed);
        }
    }

    #[test]
    fn test_rate_limit_allows_burst_then_rejects() {
        let limiter = limiter(5, 3);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert_eq!(limiter.check(ip), RateLimitResult::Allowed);
        }
        for _ in 0..3 {
            assert_eq!(limiter.check(ip), RateLimitResult::BurstUsed);
        }
        assert!(matches!(
            limiter.check(ip),
            RateLimitResult::Exceeded { .. }
        ));
    }

    #[test]
    fn test_rate_limit_is_per_ip() {
        let limiter = limiter(1, 0);
        let first: IpAddr = "10.0.0.1".parse().unwrap();
        let second: IpAddr = "10.0.0.2".parse().unwrap();

        assert_eq!(limiter.check(first), RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check(first),
            RateLimitResult::Exceeded { .. }
        ));
        assert_eq!(limiter.check(second), RateLimitResult::Allowed);
    }

    #[test]
    fn test_rate_limit_window_resets() {
        let limiter = limiter(1, 0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert_eq!(limiter.check_at(ip, start), RateLimitResult::Allowed);
        match limiter.check_at(ip, start + Duration::from_secs(10)) {
            RateLimitResult::Exceeded { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(
            limiter.check_at(ip, start + Duration::from_secs(61)),
            RateLimitResult::Allowed
        );
    }

    #[test]
    fn test_cleanup_keeps_recent_entries() {
        let limiter = limiter(5, 0);
        limiter.check("127.0.0.1".parse().unwrap());
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
