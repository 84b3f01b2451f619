//! The capability-checked router and middleware surfaces handed to plugins
//! during composition.

use crate::handler::{Middleware, RouteHandler};
use ambit_core::GrantKind;
use axum::http::Method;
use serde::Serialize;
use tracing::{debug, warn};

/// A registration the grant table refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub plugin: String,
    pub grant: GrantKind,
    pub operation: String,
}

pub(crate) struct PendingRoute {
    pub method: Method,
    pub path: String,
    pub handler: RouteHandler,
}

/// Router facade. Calls without route-write approval are dropped with a
/// warning and never reach the router.
pub struct RouteRegistrar {
    plugin: String,
    allowed: bool,
    routes: Vec<PendingRoute>,
    denied: Vec<Denial>,
}

impl RouteRegistrar {
    pub(crate) fn new(plugin: &str, allowed: bool) -> Self {
        Self {
            plugin: plugin.to_string(),
            allowed,
            routes: Vec::new(),
            denied: Vec::new(),
        }
    }

    pub fn route(&mut self, method: Method, path: &str, handler: RouteHandler) {
        if !self.allowed {
            warn!(
                plugin = %self.plugin,
                grant = %GrantKind::RouterRouteWrite,
                %method,
                path,
                "route registration denied"
            );
            self.denied.push(Denial {
                plugin: self.plugin.clone(),
                grant: GrantKind::RouterRouteWrite,
                operation: format!("{method} {path}"),
            });
            return;
        }
        debug!(plugin = %self.plugin, %method, path, "route requested");
        self.routes.push(PendingRoute {
            method,
            path: path.to_string(),
            handler,
        });
    }

    pub fn get(&mut self, path: &str, handler: RouteHandler) {
        self.route(Method::GET, path, handler);
    }

    pub fn post(&mut self, path: &str, handler: RouteHandler) {
        self.route(Method::POST, path, handler);
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub(crate) fn finish(self) -> (Vec<PendingRoute>, Vec<Denial>) {
        (self.routes, self.denied)
    }
}

/// Middleware facade, gated on middleware-write approval.
pub struct MiddlewareRegistrar {
    plugin: String,
    allowed: bool,
    wrappers: Vec<Middleware>,
    denied: Vec<Denial>,
}

impl MiddlewareRegistrar {
    pub(crate) fn new(plugin: &str, allowed: bool) -> Self {
        Self {
            plugin: plugin.to_string(),
            allowed,
            wrappers: Vec::new(),
            denied: Vec::new(),
        }
    }

    pub fn register(&mut self, wrapper: Middleware) {
        if !self.allowed {
            warn!(
                plugin = %self.plugin,
                grant = %GrantKind::RouterMiddlewareWrite,
                "middleware registration denied"
            );
            self.denied.push(Denial {
                plugin: self.plugin.clone(),
                grant: GrantKind::RouterMiddlewareWrite,
                operation: "middleware".into(),
            });
            return;
        }
        self.wrappers.push(wrapper);
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub(crate) fn finish(self) -> (Vec<Middleware>, Vec<Denial>) {
        (self.wrappers, self.denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, middleware_fn, route_fn};
    use axum::response::IntoResponse;

    fn ok_route() -> RouteHandler {
        route_fn(|_req| async { Ok("ok".into_response()) })
    }

    #[test]
    fn approved_routes_are_kept() {
        let mut mux = RouteRegistrar::new("hello", true);
        mux.get("/a", ok_route());
        mux.post("/a", ok_route());
        let (routes, denied) = mux.finish();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].method, Method::POST);
        assert!(denied.is_empty());
    }

    #[test]
    fn denied_routes_are_dropped_and_reported() {
        let mut mux = RouteRegistrar::new("hello", false);
        mux.get("/dashboard/plugins/hello", ok_route());
        let (routes, denied) = mux.finish();
        assert!(routes.is_empty());
        assert_eq!(
            denied,
            vec![Denial {
                plugin: "hello".into(),
                grant: GrantKind::RouterRouteWrite,
                operation: "GET /dashboard/plugins/hello".into(),
            }]
        );
    }

    #[test]
    fn middleware_gate() {
        let passthrough = middleware_fn(|next| next);
        let mut allowed = MiddlewareRegistrar::new("gzip", true);
        allowed.register(passthrough.clone());
        assert_eq!(allowed.finish().0.len(), 1);

        let mut refused = MiddlewareRegistrar::new("gzip", false);
        refused.register(middleware_fn(|_next| handler_fn(|_req| async { "x".into_response() })));
        let (wrappers, denied) = refused.finish();
        assert!(wrappers.is_empty());
        assert_eq!(denied[0].grant, GrantKind::RouterMiddlewareWrite);
    }
}
