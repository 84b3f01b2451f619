use super::middleware_grant;
use super::urlrewrite::clean_path;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::http::header::LOCATION;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;

/// Permanently redirects `/x/` to `/x`.
pub struct NoTrailingSlash;

/// The redirect target for `uri`, if its path ends in a slash. The target is
/// always a cleaned local path, never `//host`.
fn target(uri: &Uri) -> Option<String> {
    let path = uri.path();
    if path == "/" || !path.ends_with('/') {
        return None;
    }
    let trimmed = clean_path(path);
    Some(match uri.query() {
        Some(q) => format!("{trimmed}?{q}"),
        None => trimmed.to_string(),
    })
}

impl NoTrailingSlash {
    pub fn wrapper(&self) -> Middleware {
        middleware_fn(|next| {
            handler_fn(move |req| {
                let next = next.clone();
                async move {
                    match target(req.uri()) {
                        Some(to) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, to)]).into_response(),
                        None => next(req).await,
                    }
                }
            })
        })
    }
}

impl Plugin for NoTrailingSlash {
    fn name(&self) -> &str {
        "notrailingslash"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to redirect paths with a trailing slash.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for NoTrailingSlash {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
