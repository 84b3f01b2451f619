use ambit_core::{ErrorClass, GrantKind, GrantRequest};
use ambit_plugin::{
    Embedded, Plugin, PluginRecord, RouteProvider, RouteRegistrar, Toolkit, Vars, escape_html,
    route_fn,
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/navigation/"]
struct Assets;

static ASSETS: Embedded<Assets> = Embedded::new();

pub const PATH: &str = "/dashboard/plugins/navigation";

/// Navigation page listing the loaded plugins.
pub struct Navigation;

fn items(plugins: &[PluginRecord]) -> String {
    plugins
        .iter()
        .map(|p| {
            format!(
                "<li>{} <small>{}</small></li>",
                escape_html(&p.name),
                p.tier
            )
        })
        .collect::<Vec<_>>()
        .join("\n    ")
}

impl Plugin for Navigation {
    fn name(&self) -> &str {
        "navigation"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![
            GrantRequest::new(GrantKind::RouterRouteWrite, "Access to create the navigation page."),
            GrantRequest::new(GrantKind::SitePluginRead, "Access to list plugins in the navigation."),
        ]
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for Navigation {
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit) {
        let kit = kit.clone();
        mux.get(
            PATH,
            route_fn(move |_req| {
                let kit = kit.clone();
                async move {
                    let list = match kit.plugins() {
                        Ok(plugins) => items(&plugins),
                        // Without the grant the page still renders, just empty.
                        Err(e) if e.class() == ErrorClass::Permission => String::new(),
                        Err(e) => return Err(e),
                    };
                    let mut vars = Vars::new();
                    vars.insert("title".into(), "Navigation".into());
                    vars.insert("items".into(), list.into());
                    kit.render(&ASSETS, "index", &vars)
                }
            }),
        );
    }
}
