use crate::login::AUTH_KEY;
use ambit_core::{GrantKind, GrantRequest, Result};
use ambit_plugin::{
    Embedded, Plugin, RouteProvider, RouteRegistrar, Session, Toolkit, Vars, escape_html, route_fn,
};
use axum::response::{IntoResponse, Redirect};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "templates/envinfo/"]
struct Assets;

static ASSETS: Embedded<Assets> = Embedded::new();

pub const PATH: &str = "/dashboard/envinfo";

/// Host settings shown on the page. Secrets are never listed.
pub const SHOWN: &[&str] = &[
    "AMB_LISTEN",
    "PORT",
    "AMB_URL_PREFIX",
    "AMB_CANONICAL_URL",
    "AMB_TRUST_PROXY",
    "AMB_LOG_LEVEL",
    "AMB_STORAGE_URL",
    "AMB_SITE_PATH",
    "AMB_SESSION_PATH",
];

/// Operator page listing the environment the host was started with.
pub struct EnvInfo;

fn rows(kit: &Toolkit) -> Result<String> {
    let mut out = Vec::with_capacity(SHOWN.len());
    for key in SHOWN {
        let value = kit.env(key)?;
        out.push(format!(
            "<tr><td>{key}</td><td>{}</td></tr>",
            value.as_deref().map_or_else(|| "<em>unset</em>".to_string(), escape_html)
        ));
    }
    Ok(out.join("\n    "))
}

impl Plugin for EnvInfo {
    fn name(&self) -> &str {
        "envinfo"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![
            GrantRequest::new(GrantKind::RouterRouteWrite, "Access to create the environment page."),
            GrantRequest::new(GrantKind::EnvironmentRead, "Access to read the host settings."),
        ]
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for EnvInfo {
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
                    let mut vars = Vars::new();
                    vars.insert("title".into(), "Environment".into());
                    vars.insert("rows".into(), rows(&kit)?.into());
                    kit.render(&ASSETS, "index", &vars)
                }
            }),
        );
    }
}
