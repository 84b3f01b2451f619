//! Content-hash ETags with conditional `304 Not Modified` replies.

use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    internal_error, middleware_fn,
};
use axum::body::{Body, HttpBody};
use axum::http::header::{ETAG, IF_NONE_MATCH};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

/// Bodies larger than this, or of unknown length, are passed through untagged.
const MAX_TAGGED_BODY: u64 = 4 * 1024 * 1024;

/// Tags successful GET and HEAD responses with a strong ETag and answers a
/// matching `If-None-Match` with an empty 304.
pub struct EtagCache;

fn etag(bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes).to_hex();
    format!("\"{}\"", &hash[..32])
}

/// Weak comparison, as `If-None-Match` requires.
fn etag_matches(if_none_match: &str, tag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == tag)
}

async fn tagged(resp: Response, if_none_match: Option<String>) -> Response {
    let (mut parts, body) = resp.into_parts();
    if body
        .size_hint()
        .upper()
        .is_none_or(|len| len > MAX_TAGGED_BODY)
    {
        return Response::from_parts(parts, body);
    }
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "failed to buffer response for etag");
            return internal_error();
        }
    };
    let tag = etag(&bytes);
    let Ok(value) = HeaderValue::from_str(&tag) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    if if_none_match.is_some_and(|v| etag_matches(&v, &tag)) {
        let mut resp = StatusCode::NOT_MODIFIED.into_response();
        resp.headers_mut().insert(ETAG, value);
        return resp;
    }
    parts.headers.insert(ETAG, value);
    Response::from_parts(parts, Body::from(bytes))
}

impl EtagCache {
    pub fn wrapper(&self) -> Middleware {
        middleware_fn(|next| {
            handler_fn(move |req| {
                let next = next.clone();
                let cacheable = matches!(*req.method(), Method::GET | Method::HEAD);
                let if_none_match = req
                    .headers()
                    .get(IF_NONE_MATCH)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                async move {
                    let resp = next(req).await;
                    if !cacheable || resp.status() != StatusCode::OK || resp.headers().contains_key(ETAG) {
                        return resp;
                    }
                    tagged(resp, if_none_match).await
                }
            })
        })
    }
}

impl Plugin for EtagCache {
    fn name(&self) -> &str {
        "etagcache"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to add ETag headers and answer conditional requests.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for EtagCache {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
