use ambit_core::{AmbitError, Result};
use ambit_plugin::{Handler, HandlerService, Plugin, RouterEngine, paths_conflict};
use axum::http::{Method, StatusCode};
use axum::routing::{MethodFilter, MethodRouter};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// The CORE router: an `axum::Router` assembled from plugin registrations.
#[derive(Default)]
pub struct CoreRouter {
    routes: BTreeMap<String, MethodRouter>,
    bound: HashSet<(Method, String)>,
}

impl CoreRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route_count(&self) -> usize {
        self.bound.len()
    }
}

/// Reject paths axum would panic on.
fn check_path(path: &str) -> Result<()> {
    let invalid = |reason: &str| AmbitError::Config(format!("invalid route path '{path}': {reason}"));
    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(invalid("use {param} captures"));
    }
    if path.matches('{').count() != path.matches('}').count() {
        return Err(invalid("unbalanced braces"));
    }
    if path
        .split('/')
        .any(|segment| segment.contains('{') && !(segment.starts_with('{') && segment.ends_with('}')))
    {
        return Err(invalid("a capture must span the whole segment"));
    }
    Ok(())
}

impl Plugin for CoreRouter {
    fn name(&self) -> &str {
        "router"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }
}

impl RouterEngine for CoreRouter {
    fn add(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        check_path(path)?;
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|e| AmbitError::Config(format!("unsupported method {method}: {e}")))?;
        if let Some(existing) = self.routes.keys().find(|p| paths_conflict(p, path)) {
            return Err(AmbitError::Config(format!(
                "route {method} {path} conflicts with {existing}"
            )));
        }
        if !self.bound.insert((method.clone(), path.to_string())) {
            return Err(AmbitError::Config(format!("route {method} {path} bound twice")));
        }
        let existing = self.routes.remove(path).unwrap_or_default();
        self.routes
            .insert(path.to_string(), existing.on_service(filter, HandlerService(handler)));
        debug!(%method, path, "route bound");
        Ok(())
    }

    fn build(self: Box<Self>) -> axum::Router {
        self.routes
            .into_iter()
            .fold(axum::Router::new(), |router, (path, methods)| {
                router.route(&path, methods)
            })
            .fallback(|| async { (StatusCode::NOT_FOUND, "404 page not found\n") })
    }
}
