//! # ambit-plugin
//!
//! The capability-gated plugin host. Plugins are Rust values implementing
//! [`Plugin`]; the application lists them in a [`PluginLoader`] and the
//! [`PluginHost`] composes them into a single HTTP handler at boot.
//!
//! ## Composition
//!
//! ```text
//!   PluginLoader ──▶ validate ──▶ classify ──▶ bind routes ──▶ bind middleware ──▶ Ready
//!                    (names,      (TrustClassifier            (onion order:
//!                     grants)      → GrantTable)               first declared = outermost)
//! ```
//!
//! Every registration a plugin makes goes through a facade that checks the
//! [`GrantTable`] first. A denied registration is dropped with a warning; the
//! plugin still loads.

pub mod descriptor;
pub mod facade;
pub mod grants;
pub mod handler;
pub mod host;
pub mod loader;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod template;
pub mod toolkit;
pub mod trust;

pub use descriptor::PluginDescriptor;
pub use facade::{Denial, MiddlewareRegistrar, RouteRegistrar};
pub use grants::{GrantTable, GrantTableBuilder, PluginRecord};
pub use handler::{
    Handler, HandlerService, Middleware, RouteHandler, from_layer, handler_fn, internal_error,
    middleware_fn, route_fn, service_handler,
};
pub use host::{BootStage, BoundRoute, Composed, CompositionReport, PluginHost};
pub use loader::PluginLoader;
pub use plugin::{
    MiddlewareProvider, Plugin, PluginFeatures, RouteProvider, RouterEngine, TemplateEngine,
    paths_conflict,
};
pub use registry::CapabilityRegistry;
pub use session::Session;
pub use template::{Embedded, TemplateAssets, Vars, escape_html};
pub use toolkit::Toolkit;
pub use trust::TrustClassifier;
