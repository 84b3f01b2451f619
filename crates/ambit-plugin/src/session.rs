use axum::body::Body;
use axum::http::Request;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A request's session, placed in request extensions by the session manager.
///
/// Cloning is cheap and every clone sees the same state. Changes are
/// persisted by the session manager after the inner handler returns.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    state: Arc<RwLock<SessionState>>,
}

#[derive(Debug, Default)]
struct SessionState {
    values: BTreeMap<String, String>,
    dirty: bool,
    destroyed: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, values: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(RwLock::new(SessionState {
                values,
                ..Default::default()
            })),
        }
    }

    /// The session attached to `req`, if a session manager ran.
    pub fn from_request(req: &Request<Body>) -> Option<Session> {
        req.extensions().get::<Session>().cloned()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.state.read().values.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut state = self.state.write();
        state.values.insert(key.into(), value.into());
        state.dirty = true;
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let mut state = self.state.write();
        let old = state.values.remove(key);
        if old.is_some() {
            state.dirty = true;
        }
        old
    }

    /// Drop the session entirely at the end of the request.
    pub fn destroy(&self) {
        let mut state = self.state.write();
        state.values.clear();
        state.destroyed = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.read().destroyed
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        self.state.read().values.clone()
    }
}
