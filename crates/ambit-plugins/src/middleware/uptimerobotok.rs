use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;

/// Answers uptime monitors probing `HEAD /` with a bare 200.
pub struct UptimeRobotOk;

impl UptimeRobotOk {
    pub fn wrapper(&self) -> Middleware {
        middleware_fn(|next| {
            handler_fn(move |req| {
                let next = next.clone();
                async move {
                    if req.method() == Method::HEAD && req.uri().path() == "/" {
                        return StatusCode::OK.into_response();
                    }
                    next(req).await
                }
            })
        })
    }
}

impl Plugin for UptimeRobotOk {
    fn name(&self) -> &str {
        "uptimerobotok"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to answer uptime monitor checks.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for UptimeRobotOk {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
