//! Password sign-in for the site operator.
//!
//! The operator's password is stored only as a PBKDF2 hash in
//! `AMB_PASSWORD_HASH`, in the form
//! `pbkdf2-sha256$<iterations>$<b64 salt>$<b64 hash>`.

use ambit_core::{AmbitError, GrantKind, GrantRequest, Result};
use ambit_plugin::{
    Embedded, Plugin, RouteProvider, RouteRegistrar, Session, Toolkit, Vars, escape_html, route_fn,
};
use axum::extract::FromRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use rust_embed::RustEmbed;
use serde::Deserialize;
use std::num::NonZeroU32;
use tracing::{info, warn};

#[derive(RustEmbed)]
#[folder = "templates/login/"]
struct Assets;

static ASSETS: Embedded<Assets> = Embedded::new();

const SCHEME: &str = "pbkdf2-sha256";
pub const DEFAULT_ITERATIONS: u32 = 210_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Session key set once the visitor has signed in.
pub const AUTH_KEY: &str = "authenticated";

/// Hash a password for `AMB_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with(password: &str, iterations: u32) -> Result<String> {
    let rounds = NonZeroU32::new(iterations)
        .ok_or_else(|| AmbitError::Config("iterations must be non-zero".into()))?;
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| AmbitError::Other(anyhow::anyhow!("salt generation failed")))?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        &salt,
        password.as_bytes(),
        &mut hash,
    );
    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check `password` against an encoded hash. Malformed hashes never verify.
pub fn verify_password(encoded: &str, password: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Some(rounds) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash)) else {
        return false;
    };
    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

pub struct Login {
    password_hash: String,
}

impl Login {
    pub fn new(password_hash: impl Into<String>) -> Self {
        Self {
            password_hash: password_hash.into(),
        }
    }
}

fn form_page(kit: &Toolkit, notice: &str, status: StatusCode) -> Result<axum::response::Response> {
    let last_login = match kit.site_get("last_login") {
        Ok(value) => value.unwrap_or_else(|| "never".into()),
        Err(e) => {
            warn!(error = %e, "last sign-in unavailable");
            "unknown".into()
        }
    };
    let mut vars = Vars::new();
    vars.insert("title".into(), "Sign in".into());
    vars.insert("last_login".into(), last_login.into());
    let notice = if notice.is_empty() {
        String::new()
    } else {
        format!("<p class=\"denied\">{}</p>", escape_html(notice))
    };
    vars.insert("notice".into(), notice.into());
    let mut resp = kit.render(&ASSETS, "login", &vars)?;
    *resp.status_mut() = status;
    Ok(resp)
}

fn no_session() -> AmbitError {
    AmbitError::Handler {
        plugin: "login".into(),
        reason: "no session manager in the middleware chain".into(),
    }
}

impl Plugin for Login {
    fn name(&self) -> &str {
        "login"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![
            GrantRequest::new(GrantKind::RouterRouteWrite, "Access to create the sign-in pages."),
            GrantRequest::new(GrantKind::SiteStorageRead, "Access to show the last sign-in time."),
            GrantRequest::new(GrantKind::SiteStorageWrite, "Access to record the last sign-in time."),
        ]
    }

    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for Login {
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit) {
        let show = kit.clone();
        mux.get(
            "/login",
            route_fn(move |_req| {
                let kit = show.clone();
                async move { form_page(&kit, "", StatusCode::OK) }
            }),
        );

        let submit = kit.clone();
        let hash = self.password_hash.clone();
        mux.post(
            "/login",
            route_fn(move |req| {
                let kit = submit.clone();
                let hash = hash.clone();
                async move {
                    let session = Session::from_request(&req).ok_or_else(no_session)?;
                    let form = match axum::Form::<LoginForm>::from_request(req, &()).await {
                        Ok(axum::Form(form)) => form,
                        Err(rejection) => return Ok(rejection.into_response()),
                    };
                    if !verify_password(&hash, &form.password) {
                        warn!("sign-in failed");
                        return form_page(&kit, "Invalid password.", StatusCode::UNAUTHORIZED);
                    }
                    session.insert(AUTH_KEY, "true");
                    if let Err(e) = kit.site_put("last_login", &chrono::Utc::now().to_rfc3339()).await {
                        warn!(error = %e, "could not record sign-in time");
                    }
                    info!("operator signed in");
                    Ok(Redirect::to("/dashboard/plugins").into_response())
                }
            }),
        );

        mux.get(
            "/logout",
            route_fn(|req| async move {
                if let Some(session) = Session::from_request(&req) {
                    session.destroy();
                }
                Ok(Redirect::to("/").into_response())
            }),
        );
    }
}
