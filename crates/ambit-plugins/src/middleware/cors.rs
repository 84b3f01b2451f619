use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, from_layer, handler_fn,
    middleware_fn,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Permissive CORS for everything below a path prefix. Other paths pass
/// through untouched.
pub struct Cors {
    prefix: Arc<str>,
}

impl Cors {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().into(),
        }
    }

    pub fn wrapper(&self) -> Middleware {
        let cors = from_layer(CorsLayer::permissive());
        let prefix = self.prefix.clone();
        middleware_fn(move |next| {
            let with_cors = cors(next.clone());
            let prefix = prefix.clone();
            handler_fn(move |req| {
                let handler = if req.uri().path().starts_with(&*prefix) {
                    with_cors.clone()
                } else {
                    next.clone()
                };
                async move { handler(req).await }
            })
        })
    }
}

impl Plugin for Cors {
    fn name(&self) -> &str {
        "cors"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to add CORS headers to API responses.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for Cors {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::testing::echo;
    use axum::body::Body;
    use axum::http::Request;

    fn from_origin(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header("origin", "https://elsewhere.example")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn only_below_prefix() {
        let app = Cors::new("/api/").wrapper()(echo());
        let resp = app(from_origin("/api/healthcheck")).await;
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");

        let resp = app(from_origin("/dashboard/plugins")).await;
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
