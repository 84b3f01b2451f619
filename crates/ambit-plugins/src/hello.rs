use ambit_core::{GrantKind, GrantRequest};
use ambit_plugin::{Embedded, Plugin, RouteProvider, RouteRegistrar, Toolkit, Vars, route_fn};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/hello/"]
struct Assets;

static ASSETS: Embedded<Assets> = Embedded::new();

pub const PATH: &str = "/dashboard/plugins/hello";

/// A sample page plugin.
pub struct Hello;

impl Plugin for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![GrantRequest::new(
            GrantKind::RouterRouteWrite,
            "Access to create the hello page.",
        )]
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for Hello {
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit) {
        let kit = kit.clone();
        mux.get(
            PATH,
            route_fn(move |_req| {
                let kit = kit.clone();
                async move {
                    let mut vars = Vars::new();
                    vars.insert("title".into(), "Plugins".into());
                    kit.render(&ASSETS, "hello", &vars)
                }
            }),
        );
    }
}
