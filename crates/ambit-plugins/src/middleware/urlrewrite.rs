//! Strips a reverse-proxy path prefix before routing.

use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::http::Uri;
use axum::http::uri::PathAndQuery;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct UrlRewrite {
    prefix: Option<Arc<str>>,
}

impl UrlRewrite {
    /// `None` or an empty prefix makes the plugin load without wrapping
    /// anything.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(Into::into),
        }
    }

    pub fn wrapper(&self) -> Option<Middleware> {
        let prefix = self.prefix.clone()?;
        Some(middleware_fn(move |next| {
            let prefix = prefix.clone();
            handler_fn(move |mut req| {
                let next = next.clone();
                match rewrite(req.uri(), &prefix) {
                    Some(Ok(uri)) => {
                        debug!(from = %req.uri(), to = %uri, "url rewritten");
                        *req.uri_mut() = uri;
                    }
                    Some(Err(e)) => warn!(uri = %req.uri(), error = %e, "url rewrite failed"),
                    None => {}
                }
                async move { next(req).await }
            })
        }))
    }
}

/// Collapse repeated slashes, resolve `.` and `..`, and drop any trailing
/// slash. The result always starts with `/`.
pub fn clean_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    format!("/{}", out.join("/"))
}

fn rewrite(uri: &Uri, prefix: &str) -> Option<Result<Uri, axum::http::Error>> {
    let rest = uri.path().strip_prefix(prefix)?;
    let path = clean_path(rest);
    let target = match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path,
    };
    let mut parts = uri.clone().into_parts();
    Some(
        target
            .parse::<PathAndQuery>()
            .map_err(axum::http::Error::from)
            .and_then(|pq| {
                parts.path_and_query = Some(pq);
                Uri::from_parts(parts).map_err(axum::http::Error::from)
            }),
    )
}

impl Plugin for UrlRewrite {
    fn name(&self) -> &str {
        "urlrewrite"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to rewrite the request path.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for UrlRewrite {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        if let Some(wrapper) = self.wrapper() {
            chain.register(wrapper);
        }
    }
}
