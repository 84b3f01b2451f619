use crate::login::AUTH_KEY;
use ambit_core::{GrantKind, GrantRequest};
use ambit_plugin::{
    Embedded, Plugin, PluginRecord, RouteProvider, RouteRegistrar, Session, Toolkit, Vars,
    escape_html, route_fn,
};
use axum::response::{IntoResponse, Redirect};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/pluginmanager/"]
struct Assets;

static ASSETS: Embedded<Assets> = Embedded::new();

pub const PATH: &str = "/dashboard/plugins";

/// Operator page showing every plugin's tier and grant approvals.
pub struct PluginManager;

fn rows(plugins: &[PluginRecord]) -> String {
    plugins
        .iter()
        .map(|p| {
            let grants = p
                .grants
                .iter()
                .map(|(kind, approved)| {
                    if *approved {
                        kind.to_string()
                    } else {
                        format!("<span class=\"denied\">{kind} (denied)</span>")
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&p.name),
                escape_html(&p.version),
                p.tier,
                if grants.is_empty() { "none".into() } else { grants }
            )
        })
        .collect::<Vec<_>>()
        .join("\n    ")
}

impl Plugin for PluginManager {
    fn name(&self) -> &str {
        "pluginmanager"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![
            GrantRequest::new(GrantKind::RouterRouteWrite, "Access to create the plugin management page."),
            GrantRequest::new(GrantKind::SitePluginRead, "Access to read the plugins and their grants."),
        ]
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for PluginManager {
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit) {
        let kit = kit.clone();
        mux.get(
            PATH,
            route_fn(move |req| {
                let kit = kit.clone();
                async move {
                    let signed_in = Session::from_request(&req)
                        .and_then(|s| s.get(AUTH_KEY))
                        .is_some_and(|v| v == "true");
                    if !signed_in {
                        return Ok(Redirect::to("/login").into_response());
                    }
                    let plugins = kit.plugins()?;
                    let mut vars = Vars::new();
                    vars.insert("title".into(), "Plugins".into());
                    vars.insert("rows".into(), rows(&plugins).into());
                    kit.render(&ASSETS, "index", &vars)
                }
            }),
        );
    }
}
