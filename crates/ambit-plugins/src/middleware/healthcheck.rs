use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::sync::Arc;

/// Answers `ok` on a fixed path before any routing happens.
pub struct HealthCheck {
    path: Arc<str>,
}

impl HealthCheck {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into().into(),
        }
    }

    pub fn wrapper(&self) -> Middleware {
        let path = self.path.clone();
        middleware_fn(move |next| {
            let path = path.clone();
            handler_fn(move |req| {
                let next = next.clone();
                let hit = req.uri().path() == &*path;
                async move {
                    if hit {
                        return (StatusCode::OK, "ok").into_response();
                    }
                    next(req).await
                }
            })
        })
    }
}

impl Plugin for HealthCheck {
    fn name(&self) -> &str {
        "healthcheck"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to answer health checks.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for HealthCheck {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
