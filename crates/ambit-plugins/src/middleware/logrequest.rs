use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, handler_fn,
    middleware_fn,
};
use std::time::Instant;
use tracing::info;

/// Logs method, path, status and latency of every request.
pub struct LogRequest;

impl Plugin for LogRequest {
    fn name(&self) -> &str {
        "logrequest"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to log each request.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl LogRequest {
    pub fn wrapper(&self) -> Middleware {
        middleware_fn(|next| {
            handler_fn(move |req| {
                let next = next.clone();
                async move {
                    let method = req.method().clone();
                    let path = req.uri().path().to_string();
                    let started = Instant::now();
                    let resp = next(req).await;
                    info!(
                        %method,
                        path,
                        status = resp.status().as_u16(),
                        latency_ms = started.elapsed().as_millis() as u64,
                        "request"
                    );
                    resp
                }
            })
        })
    }
}

impl MiddlewareProvider for LogRequest {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
