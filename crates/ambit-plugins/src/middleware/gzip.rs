use super::middleware_grant;
use ambit_core::GrantRequest;
use ambit_plugin::{
    Middleware, MiddlewareProvider, MiddlewareRegistrar, Plugin, Toolkit, from_layer,
};
use tower_http::compression::CompressionLayer;

/// Compresses responses for clients that accept gzip.
pub struct Gzip;

impl Gzip {
    pub fn wrapper(&self) -> Middleware {
        from_layer(CompressionLayer::new())
    }
}

impl Plugin for Gzip {
    fn name(&self) -> &str {
        "gzip"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        middleware_grant("Access to compress responses.")
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for Gzip {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        chain.register(self.wrapper());
    }
}
