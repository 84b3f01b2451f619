//! Middleware plugins. Each one asks for `router-middleware-write` and
//! registers a single wrapper.

pub mod cors;
pub mod etagcache;
pub mod gzip;
pub mod healthcheck;
pub mod logrequest;
pub mod notrailingslash;
pub mod ratelimit;
pub mod redirecttourl;
pub mod uptimerobotok;
pub mod urlrewrite;

pub use cors::Cors;
pub use etagcache::EtagCache;
pub use gzip::Gzip;
pub use healthcheck::HealthCheck;
pub use logrequest::LogRequest;
pub use notrailingslash::NoTrailingSlash;
pub use ratelimit::{RateLimit, RateLimitConfig, RateLimiter};
pub use redirecttourl::RedirectToUrl;
pub use uptimerobotok::UptimeRobotOk;
pub use urlrewrite::UrlRewrite;

use ambit_core::{GrantKind, GrantRequest};

fn middleware_grant(purpose: &str) -> Vec<GrantRequest> {
    vec![GrantRequest::new(GrantKind::RouterMiddlewareWrite, purpose)]
}
