//! The application: which plugins load, and in what order.

use ambit_config::HostConfig;
use ambit_plugin::PluginLoader;
use ambit_plugins::middleware::{
    Cors, EtagCache, Gzip, HealthCheck, LogRequest, NoTrailingSlash, RateLimit, RateLimitConfig,
    RedirectToUrl, UptimeRobotOk, UrlRewrite,
};
use ambit_plugins::{EnvInfo, Hello, Login, Navigation, PluginManager};
use ambit_server::{CookieSessions, CoreRouter, HtmlEngine};
use std::sync::Arc;

/// Build the loader for the bundled application.
///
/// Middleware is listed outermost first. The session manager fills its CORE
/// slot and also sits in the middleware list, after rate limiting and before
/// anything that renders pages.
pub fn loader(config: &HostConfig, sessions: Arc<CookieSessions>, password_hash: &str) -> PluginLoader {
    PluginLoader::new()
        .router(CoreRouter::new())
        .template_engine(Arc::new(HtmlEngine::new()))
        .session_manager(sessions.clone())
        .plugin(Arc::new(PluginManager))
        .plugin(Arc::new(Login::new(password_hash)))
        .plugin(Arc::new(EnvInfo))
        .plugin(Arc::new(Hello))
        .plugin(Arc::new(Navigation))
        .middleware(Arc::new(LogRequest))
        .middleware(Arc::new(UrlRewrite::new(config.server.url_prefix.clone())))
        .middleware(Arc::new(RateLimit::new(RateLimitConfig {
            trust_proxy_headers: config.server.trust_proxy_headers,
            ..Default::default()
        })))
        .middleware(sessions)
        .middleware(Arc::new(Gzip))
        .middleware(Arc::new(EtagCache))
        .middleware(Arc::new(RedirectToUrl::new(config.server.canonical_url.clone())))
        .middleware(Arc::new(Cors::new(config.server.cors_prefix.clone())))
        .middleware(Arc::new(HealthCheck::new(config.server.healthcheck_path.clone())))
        .middleware(Arc::new(UptimeRobotOk))
        .middleware(Arc::new(NoTrailingSlash))
}
