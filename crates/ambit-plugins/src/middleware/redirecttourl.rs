use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::body::Body;
use axum::http::header::{HOST, LOCATION};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;

/// Permanently redirects requests for any host other than the canonical
/// URL's host. Without a canonical URL every request passes through.
pub struct RedirectToUrl {
    base: Option<Arc<str>>,
}

impl RedirectToUrl {
    pub fn new(canonical_url: Option<String>) -> Self {
        Self {
            base: canonical_url.map(|url| url.trim_end_matches('/').into()),
        }
    }

    pub fn wrapper(&self) -> Middleware {
        let base = self.base.clone();
        middleware_fn(move |next| {
            let base = base.clone();
            handler_fn(move |req| {
                let next = next.clone();
                let to = base.as_deref().and_then(|base| target(base, &req));
                async move {
                    match to {
                        Some(to) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, to)]).into_response(),
                        None => next(req).await,
                    }
                }
            })
        })
    }
}

/// `base` plus the request's path and query, if the request named another
/// host. Requests without a host are left alone.
fn target(base: &str, req: &Request<Body>) -> Option<String> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))?;
    let canonical = base.split_once("://").map_or(base, |(_, host)| host);
    if host.eq_ignore_ascii_case(canonical) {
        return None;
    }
    let rest = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
    Some(format!("{base}{rest}"))
}

impl Plugin for RedirectToUrl {
    fn name(&self) -> &str {
        "redirecttourl"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to redirect requests to the canonical URL.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for RedirectToUrl {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
