//! In-memory token-bucket rate limiting.
//!
//! Each client IP gets an independent bucket with a configurable burst and
//! refill rate. When exhausted, the middleware returns `429 Too Many
//! Requests` with a `Retry-After` header.
//!
//! The client is the socket peer. Forwarding headers are only read when the
//! host runs behind a reverse proxy that sets them.

use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

const CLEANUP_EVERY: u64 = 1024;
const STALE_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Tokens in a full bucket.
    pub burst: u32,
    pub refill_per_sec: f64,
    /// Key clients by `x-forwarded-for` / `x-real-ip` instead of the peer.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 60,
            refill_per_sec: 10.0,
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, burst: u32, refill_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(burst as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whole seconds until the next token.
    fn retry_after(&self, refill_per_sec: f64) -> u64 {
        if refill_per_sec <= 0.0 {
            return 60;
        }
        ((1.0 - self.tokens) / refill_per_sec).ceil().max(1.0) as u64
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, Bucket>>,
    checks: Arc<AtomicU64>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// `Err` carries the retry delay in seconds.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % CLEANUP_EVERY == CLEANUP_EVERY - 1 {
            self.cleanup();
        }
        let mut entry = self
            .buckets
            .entry(ip)
            .or_insert_with(|| Bucket::new(self.config.burst));
        if entry.try_consume(self.config.burst, self.config.refill_per_sec) {
            Ok(())
        } else {
            Err(entry.retry_after(self.config.refill_per_sec))
        }
    }

    /// Drop buckets idle for five minutes.
    pub fn cleanup(&self) {
        let Some(cutoff) = Instant::now().checked_sub(STALE_AFTER) else {
            return;
        };
        self.buckets.retain(|_, bucket| bucket.last_refill > cutoff);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// First address in `x-forwarded-for`, then `x-real-ip`.
fn forwarded_ip(req: &Request<Body>) -> Option<IpAddr> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
        && let Ok(ip) = first.trim().parse::<IpAddr>()
    {
        return Some(ip);
    }
    req.headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
}

/// The socket peer, or the forwarded client when proxy headers are trusted.
/// Requests without connection info (in-process calls) count as localhost.
fn client_ip(req: &Request<Body>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers && let Some(ip) = forwarded_ip(req) {
        return ip;
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub struct RateLimit {
    limiter: RateLimiter,
}

impl RateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn wrapper(&self) -> Middleware {
        let limiter = self.limiter.clone();
        let trust_proxy_headers = limiter.config.trust_proxy_headers;
        middleware_fn(move |next| {
            let limiter = limiter.clone();
            handler_fn(move |req| {
                let next = next.clone();
                let ip = client_ip(&req, trust_proxy_headers);
                let verdict = limiter.check(ip);
                async move {
                    match verdict {
                        Ok(()) => next(req).await,
                        Err(retry_after) => {
                            warn!(client_ip = %ip, retry_after, "rate limited");
                            let mut resp = (
                                StatusCode::TOO_MANY_REQUESTS,
                                format!("Rate limit exceeded. Retry after {retry_after} seconds."),
                            )
                                .into_response();
                            resp.headers_mut()
                                .insert(RETRY_AFTER, HeaderValue::from(retry_after));
                            resp
                        }
                    }
                }
            })
        })
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl Plugin for RateLimit {
    fn name(&self) -> &str {
        "ratelimit"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to throttle clients that send too many requests.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for RateLimit {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::{echo, get};

    fn limiter(burst: u32, refill_per_sec: f64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            burst,
            refill_per_sec,
            ..Default::default()
        })
    }

    #[test]
    fn test_bucket_allows_burst() {
        let limiter = limiter(3, 1.0);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_ok());
        assert!(limiter.check(ip).is_err());
    }

    #[test]
    fn test_different_ips_independent() {
        let limiter = limiter(1, 0.0);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(a).is_ok());
        assert_eq!(limiter.check(a), Err(60));
        assert!(limiter.check(b).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_cleanup_keeps_recent() {
        let limiter = limiter(5, 1.0);
        limiter.check(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 1);
    }

    fn from_peer(peer: &str, forwarded: Option<&str>) -> Request<Body> {
        let mut req = Request::get("/");
        if let Some(ip) = forwarded {
            req = req.header("x-forwarded-for", ip);
        }
        let mut req = req.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        req
    }

    #[test]
    fn test_client_ip_is_the_peer() {
        let req = from_peer("198.51.100.4:50000", Some("203.0.113.7"));
        assert_eq!(client_ip(&req, false), "198.51.100.4".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&get("/"), false), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_client_ip_headers_behind_proxy() {
        let req = from_peer("10.0.0.1:50000", Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&req, true), "203.0.113.7".parse::<IpAddr>().unwrap());

        let req = Request::get("/")
            .header("x-real-ip", " 2001:db8::1 ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), "2001:db8::1".parse::<IpAddr>().unwrap());

        let req = from_peer("10.0.0.1:50000", None);
        assert_eq!(client_ip(&req, true), "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_peers_get_separate_buckets() {
        let plugin = RateLimit::new(RateLimitConfig {
            burst: 1,
            refill_per_sec: 0.0,
            ..Default::default()
        });
        let app = plugin.wrapper()(echo());
        assert_eq!(app(from_peer("198.51.100.1:1000", None)).await.status(), StatusCode::OK);
        assert_eq!(
            app(from_peer("198.51.100.1:1001", None)).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(app(from_peer("198.51.100.2:1000", None)).await.status(), StatusCode::OK);
        // A made-up forwarding header does not buy a fresh bucket.
        assert_eq!(
            app(from_peer("198.51.100.1:1002", Some("1.2.3.4"))).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(plugin.limiter().tracked_clients(), 2);
    }

    #[tokio::test]
    async fn test_middleware_returns_429() {
        let plugin = RateLimit::new(RateLimitConfig {
            burst: 1,
            refill_per_sec: 1.0,
            ..Default::default()
        });
        let app = plugin.wrapper()(echo());
        assert_eq!(app(get("/")).await.status(), StatusCode::OK);
        let resp = app(get("/")).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers()[RETRY_AFTER], "1");
    }
}
