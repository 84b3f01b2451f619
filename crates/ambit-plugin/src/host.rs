use crate::descriptor::PluginDescriptor;
use crate::facade::{Denial, MiddlewareRegistrar, RouteRegistrar};
use crate::grants::{GrantTable, GrantTableBuilder};
use crate::handler::{Handler, HandlerService, Middleware, RouteHandler, handler_fn, internal_error, service_handler};
use crate::loader::{LoadedSet, PluginLoader};
use crate::plugin::{TemplateEngine, paths_conflict};
use crate::registry::CapabilityRegistry;
use crate::toolkit::Toolkit;
use crate::trust::TrustClassifier;
use ambit_config::Environment;
use ambit_core::{AmbitError, GrantKind, Result};
use ambit_storage::SiteStore;
use axum::http::Method;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Boot progress. Stages only move forward; a failure leaves the host at the
/// last completed stage and no handler is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootStage {
    Unloaded,
    Classified,
    RoutesBound,
    MiddlewareBound,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundRoute {
    pub plugin: String,
    pub method: String,
    pub path: String,
}

/// What composition did, for logs and the `grants` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompositionReport {
    pub routes: Vec<BoundRoute>,
    /// Owning plugin of each wrapper, outermost first.
    pub middleware: Vec<String>,
    pub denied: Vec<Denial>,
    /// Registrations dropped because an earlier plugin bound the same
    /// method and path.
    pub shadowed: Vec<BoundRoute>,
}

/// The output of a successful composition.
pub struct Composed {
    pub handler: axum::Router,
    pub grants: Arc<GrantTable>,
    pub report: CompositionReport,
}

/// The composition engine.
///
/// Walks the ordered plugin list once: validate, classify, bind routes, bind
/// middleware, wrap the router in the chain. Everything it produces is
/// immutable afterwards.
pub struct PluginHost {
    registry: CapabilityRegistry,
    classifier: TrustClassifier,
    site: Option<Arc<SiteStore>>,
    env: Arc<Environment>,
    stage: BootStage,
}

impl PluginHost {
    pub fn new(registry: CapabilityRegistry, classifier: TrustClassifier) -> Self {
        Self {
            registry,
            classifier,
            site: None,
            env: Arc::new(Environment::default()),
            stage: BootStage::Unloaded,
        }
    }

    pub fn with_site_store(mut self, site: Arc<SiteStore>) -> Self {
        self.site = Some(site);
        self
    }

    pub fn with_environment(mut self, env: Environment) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn stage(&self) -> BootStage {
        self.stage
    }

    fn advance(&mut self, next: BootStage) {
        debug_assert!(next > self.stage, "boot stage moved backwards");
        debug!(from = ?self.stage, to = ?next, "boot stage");
        self.stage = next;
    }

    pub fn compose(&mut self, loader: PluginLoader) -> Result<Composed> {
        if self.stage != BootStage::Unloaded {
            return Err(AmbitError::Config("plugin host already composed".into()));
        }
        let LoadedSet {
            mut router,
            templates,
            descriptors,
        } = loader.into_set()?;

        self.validate(&descriptors)?;

        let grants = Arc::new(self.classify(&descriptors)?);
        self.advance(BootStage::Classified);

        let mut report = CompositionReport::default();
        let mut bound: HashSet<(Method, String)> = HashSet::new();
        let mut paths: Vec<String> = Vec::new();
        for d in &descriptors {
            let Some(provider) = d.plugin.as_ref().and_then(|p| p.routes()) else {
                continue;
            };
            let kit = self.toolkit(&d.name, &grants, &templates);
            let mut mux =
                RouteRegistrar::new(&d.name, grants.is_approved(&d.name, GrantKind::RouterRouteWrite));
            provider.register_routes(&mut mux, &kit);

            let (routes, denied) = mux.finish();
            report.denied.extend(denied);
            for route in routes {
                let entry = BoundRoute {
                    plugin: d.name.clone(),
                    method: route.method.to_string(),
                    path: route.path.clone(),
                };
                if !bound.insert((route.method.clone(), route.path.clone())) {
                    warn!(
                        plugin = %d.name,
                        method = %route.method,
                        path = %route.path,
                        "route already bound, keeping the first registration"
                    );
                    report.shadowed.push(entry);
                    continue;
                }
                if let Some(existing) = paths.iter().find(|p| paths_conflict(p, &route.path)) {
                    warn!(
                        plugin = %d.name,
                        method = %route.method,
                        path = %route.path,
                        existing = %existing,
                        "route captures conflict with a bound path, keeping the first registration"
                    );
                    bound.remove(&(route.method.clone(), route.path.clone()));
                    report.shadowed.push(entry);
                    continue;
                }
                if !paths.contains(&route.path) {
                    paths.push(route.path.clone());
                }
                router.add(route.method, &route.path, guard_route(&d.name, route.handler))?;
                report.routes.push(entry);
            }
        }
        self.advance(BootStage::RoutesBound);

        let mut chain: Vec<Middleware> = Vec::new();
        for d in &descriptors {
            let Some(provider) = d.plugin.as_ref().and_then(|p| p.middleware()) else {
                continue;
            };
            let kit = self.toolkit(&d.name, &grants, &templates);
            let mut registrar = MiddlewareRegistrar::new(
                &d.name,
                grants.is_approved(&d.name, GrantKind::RouterMiddlewareWrite),
            );
            provider.register_middleware(&mut registrar, &kit);

            let (wrappers, denied) = registrar.finish();
            report.denied.extend(denied);
            for wrapper in wrappers {
                report.middleware.push(d.name.clone());
                chain.push(wrapper);
            }
        }
        self.advance(BootStage::MiddlewareBound);

        // Apply in reverse so the first-declared wrapper ends up outermost.
        let inner = service_handler(router.build());
        let composed = chain.iter().rev().fold(inner, |next, wrap| wrap(next));
        let handler = axum::Router::new()
            .fallback_service(HandlerService(composed))
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http());
        self.advance(BootStage::Ready);

        info!(
            plugins = descriptors.len(),
            routes = report.routes.len(),
            middleware = report.middleware.len(),
            denied = report.denied.len(),
            "composition complete"
        );
        Ok(Composed {
            handler,
            grants,
            report,
        })
    }

    fn validate(&self, descriptors: &[PluginDescriptor]) -> Result<()> {
        let mut names = HashSet::new();
        for d in descriptors {
            if !names.insert(d.name.as_str()) {
                return Err(AmbitError::DuplicatePlugin(d.name.clone()));
            }
        }
        for d in descriptors {
            d.validate(&self.registry)?;
        }
        Ok(())
    }

    fn classify(&self, descriptors: &[PluginDescriptor]) -> Result<GrantTable> {
        let mut builder = GrantTableBuilder::new();
        for d in descriptors {
            let (tier, decisions) = self.classifier.classify_and_approve(d);
            builder.add_plugin(&d.name, &d.version, tier, d.core_role)?;
            for (kind, approved) in decisions {
                builder.record(&d.name, kind, approved)?;
            }
        }
        Ok(builder.finish())
    }

    fn toolkit(
        &self,
        plugin: &str,
        grants: &Arc<GrantTable>,
        templates: &Arc<dyn TemplateEngine>,
    ) -> Toolkit {
        Toolkit::new(
            plugin,
            grants.clone(),
            templates.clone(),
            self.site.clone(),
            self.env.clone(),
        )
    }
}

/// Convert a plugin handler's error into a logged, generic 500.
fn guard_route(plugin: &str, handler: RouteHandler) -> Handler {
    let plugin: Arc<str> = Arc::from(plugin);
    handler_fn(move |req| {
        let plugin = plugin.clone();
        let handler = handler.clone();
        async move {
            match handler(req).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!(plugin = %plugin, error = %e, "route handler failed");
                    internal_error()
                }
            }
        }
    })
}
