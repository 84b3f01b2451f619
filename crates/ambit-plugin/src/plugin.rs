use crate::facade::{MiddlewareRegistrar, RouteRegistrar};
use crate::handler::Handler;
use crate::template::{TemplateAssets, Vars};
use crate::toolkit::Toolkit;
use ambit_core::{GrantRequest, Result};
use axum::http::Method;

/// A unit of extension loaded into the host at boot.
///
/// Every plugin reports its identity and the grants it needs. Routing and
/// middleware are optional capability sets: a plugin exposes them by
/// returning `Some` from [`Plugin::routes`] or [`Plugin::middleware`], and the
/// host never looks for them any other way.
pub trait Plugin: Send + Sync {
    /// Unique name, `[a-z0-9_-]+`.
    fn name(&self) -> &str;

    /// Semantic version string.
    fn version(&self) -> &str;

    fn grant_requests(&self) -> Vec<GrantRequest> {
        Vec::new()
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        None
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        None
    }

    fn features(&self) -> PluginFeatures {
        PluginFeatures {
            has_routes: self.routes().is_some(),
            has_middleware: self.middleware().is_some(),
            has_grants: !self.grant_requests().is_empty(),
        }
    }
}

/// Which optional capability sets a plugin implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PluginFeatures {
    pub has_routes: bool,
    pub has_middleware: bool,
    pub has_grants: bool,
}

pub trait RouteProvider: Send + Sync {
    /// Called once during composition. Every call on `mux` is checked against
    /// the plugin's route-write grant.
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit);
}

pub trait MiddlewareProvider: Send + Sync {
    /// Called once during composition. Wrappers are applied in the order they
    /// are registered, across all plugins in declaration order.
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, kit: &Toolkit);
}

/// The CORE router role.
pub trait RouterEngine: Plugin {
    fn add(&mut self, method: Method, path: &str, handler: Handler) -> Result<()>;

    /// Consume the engine, producing the innermost request handler.
    fn build(self: Box<Self>) -> axum::Router;
}

/// True when two distinct paths cannot share one router: at the first
/// segment where they differ, both are captures.
pub fn paths_conflict(a: &str, b: &str) -> bool {
    let capture = |segment: &str| segment.starts_with('{');
    a.split('/')
        .zip(b.split('/'))
        .find(|(x, y)| x != y)
        .is_some_and(|(x, y)| capture(x) && capture(y))
}

/// The CORE template-engine role. The host treats the markup format as
/// opaque.
pub trait TemplateEngine: Plugin {
    fn render(&self, assets: &dyn TemplateAssets, page: &str, vars: &Vars) -> Result<String>;
}
