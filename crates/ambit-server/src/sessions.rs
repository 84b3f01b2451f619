//! The CORE session manager.
//!
//! Sessions are identified by a random id carried in a signed cookie
//! (`<id>.<base64url HMAC-SHA256>`). Their values live in one encrypted
//! record written through [`SecureStorage`]. The same value is both the CORE
//! session-manager plugin and a middleware that attaches a [`Session`] to
//! every request.

use ambit_config::schema::SessionConfig;
use ambit_core::{AmbitError, GrantKind, GrantRequest, Result};
use ambit_plugin::{
    Handler, MiddlewareProvider, MiddlewareRegistrar, Plugin, Session, Toolkit, handler_fn,
    middleware_fn,
};
use ambit_storage::SecureStorage;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    values: BTreeMap<String, String>,
    expires_at: DateTime<Utc>,
}

struct SessionStore {
    storage: Arc<SecureStorage>,
    path: String,
    key: hmac::Key,
    cookie_name: String,
    lifetime: chrono::Duration,
    secure_cookie: bool,
    records: RwLock<HashMap<String, SessionRecord>>,
    commit: tokio::sync::Mutex<()>,
}

pub struct CookieSessions {
    inner: Arc<SessionStore>,
}

impl CookieSessions {
    /// Load the session record at `path`. A missing record starts empty. A
    /// record that cannot be decrypted is discarded: every client simply
    /// has no valid session.
    pub async fn load(
        storage: Arc<SecureStorage>,
        path: impl Into<String>,
        secret: &str,
        config: &SessionConfig,
    ) -> Result<Self> {
        let path = path.into();
        let now = Utc::now();
        let mut records = match storage
            .get_json::<HashMap<String, SessionRecord>>(&path)
            .await
        {
            Ok(records) => records,
            Err(e) if e.is_not_found() => HashMap::new(),
            Err(AmbitError::Decryption(reason)) => {
                warn!(path = %path, %reason, "session record unreadable, starting with no sessions");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        records.retain(|_, r| r.expires_at > now);
        info!(path = %path, sessions = records.len(), "session store loaded");

        let lifetime = i64::try_from(config.lifetime_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| AmbitError::ConfigValidation {
                field: "session.lifetime_secs".into(),
                reason: "out of range".into(),
            })?;

        Ok(Self {
            inner: Arc::new(SessionStore {
                storage,
                path,
                key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
                cookie_name: config.cookie_name.clone(),
                lifetime,
                secure_cookie: config.secure_cookie,
                records: RwLock::new(records),
                commit: tokio::sync::Mutex::new(()),
            }),
        })
    }

    pub fn session_count(&self) -> usize {
        self.inner.records.read().len()
    }

    /// Sign a session id into a cookie value.
    pub fn sign(&self, id: &str) -> String {
        self.inner.sign(id)
    }

    /// The session id carried by a cookie value, if its signature holds.
    pub fn verify(&self, cookie: &str) -> Option<String> {
        self.inner.verify(cookie)
    }

    fn wrap(&self, next: Handler) -> Handler {
        let store = self.inner.clone();
        handler_fn(move |mut req| {
            let store = store.clone();
            let next = next.clone();
            async move {
                let (session, existed) = store.open(req.headers());
                req.extensions_mut().insert(session.clone());
                let mut resp = next(req).await;
                store.finish(&session, existed, &mut resp).await;
                resp
            }
        })
    }
}

impl SessionStore {
    fn sign(&self, id: &str) -> String {
        let tag = hmac::sign(&self.key, id.as_bytes());
        format!("{id}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }

    fn verify(&self, cookie: &str) -> Option<String> {
        let (id, sig) = cookie.split_once('.')?;
        let sig = URL_SAFE_NO_PAD.decode(sig).ok()?;
        hmac::verify(&self.key, id.as_bytes(), &sig).ok()?;
        Some(id.to_string())
    }

    fn cookie<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .map(|(_, value)| value)
    }

    /// The caller's live session, or a fresh one that is only stored if the
    /// request writes to it.
    fn open(&self, headers: &HeaderMap) -> (Session, bool) {
        let now = Utc::now();
        if let Some(id) = self.cookie(headers).and_then(|c| self.verify(c)) {
            let records = self.records.read();
            if let Some(record) = records.get(&id).filter(|r| r.expires_at > now) {
                return (Session::new(id, record.values.clone()), true);
            }
        }
        let id = uuid::Uuid::new_v4().simple().to_string();
        (Session::new(id, BTreeMap::new()), false)
    }

    async fn finish(&self, session: &Session, existed: bool, resp: &mut Response) {
        let cookie = if session.is_destroyed() {
            if !existed {
                return;
            }
            self.records.write().remove(session.id());
            debug!(session = %session.id(), "session destroyed");
            self.set_cookie_header("", 0)
        } else if session.is_dirty() {
            let record = SessionRecord {
                values: session.values(),
                expires_at: Utc::now() + self.lifetime,
            };
            self.records.write().insert(session.id().to_string(), record);
            self.set_cookie_header(&self.sign(session.id()), self.lifetime.num_seconds())
        } else {
            return;
        };

        if let Err(e) = self.persist().await {
            error!(error = %e, "failed to persist sessions");
        }
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                resp.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "invalid session cookie header"),
        }
    }

    fn set_cookie_header(&self, value: &str, max_age: i64) -> String {
        let secure = if self.secure_cookie { "; Secure" } else { "" };
        format!(
            "{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{secure}",
            self.cookie_name
        )
    }

    async fn persist(&self) -> Result<()> {
        let _commit = self.commit.lock().await;
        let now = Utc::now();
        let snapshot = {
            let mut records = self.records.write();
            records.retain(|_, r| r.expires_at > now);
            records.clone()
        };
        self.storage.put_json(&self.path, &snapshot).await
    }
}

impl Plugin for CookieSessions {
    fn name(&self) -> &str {
        "sessionmanager"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![GrantRequest::new(
            GrantKind::RouterMiddlewareWrite,
            "Attaches the visitor's session to every request",
        )]
    }

    fn middleware(&self) -> Option<&dyn MiddlewareProvider> {
        Some(self)
    }
}

impl MiddlewareProvider for CookieSessions {
    fn register_middleware(&self, chain: &mut MiddlewareRegistrar, _kit: &Toolkit) {
        let this = CookieSessions {
            inner: self.inner.clone(),
        };
        chain.register(middleware_fn(move |next| this.wrap(next)));
    }
}
