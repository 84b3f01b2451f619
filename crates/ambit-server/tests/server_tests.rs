use ambit_config::schema::SessionConfig;
use ambit_core::{AmbitError, GrantKind, GrantRequest};
use ambit_plugin::*;
use ambit_server::{CookieSessions, CoreRouter, HtmlEngine, serve};
use ambit_storage::{MemoryStorage, SecureStorage};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

/// Counts visits in the session and renders them.
struct Counter;

struct CounterPages;

impl TemplateAssets for CounterPages {
    fn get(&self, name: &str) -> Option<Cow<'static, [u8]>> {
        (name == "count.html").then_some(Cow::Borrowed(b"<p>visits: {{ visits }}</p>".as_slice()))
    }
}

impl Plugin for Counter {
    fn name(&self) -> &str {
        "counter"
    }
    fn version(&self) -> &str {
        "0.1.0"
    }
    fn grant_requests(&self) -> Vec<GrantRequest> {
        vec![GrantRequest::new(GrantKind::RouterRouteWrite, "counter page")]
    }
    fn routes(&self) -> Option<&dyn RouteProvider> {
        Some(self)
    }
}

impl RouteProvider for Counter {
    fn register_routes(&self, mux: &mut RouteRegistrar, kit: &Toolkit) {
        let kit = kit.clone();
        mux.get(
            "/count",
            route_fn(move |req| {
                let kit = kit.clone();
                async move {
                    let session = Session::from_request(&req).ok_or_else(|| AmbitError::Handler {
                        plugin: "counter".into(),
                        reason: "no session".into(),
                    })?;
                    let visits = session
                        .get("visits")
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(0)
                        + 1;
                    session.insert("visits", visits.to_string());
                    let mut vars = Vars::new();
                    vars.insert("title".into(), "Counter".into());
                    vars.insert("visits".into(), visits.into());
                    kit.render(&CounterPages, "count", &vars)
                }
            }),
        );
        mux.get(
            "/peek",
            route_fn(|_req| async { Ok("peek".into_response()) }),
        );
        mux.get(
            "/peer",
            route_fn(|req| async move {
                let peer = req
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
                    .unwrap_or_default();
                Ok(peer.into_response())
            }),
        );
    }
}

async fn compose(sessions: Arc<CookieSessions>) -> Composed {
    let loader = PluginLoader::new()
        .router(CoreRouter::new())
        .template_engine(Arc::new(HtmlEngine::new()))
        .session_manager(sessions.clone())
        .plugin(Arc::new(Counter))
        .middleware(sessions);
    PluginHost::new(
        CapabilityRegistry::standard(),
        TrustClassifier::default().trust("counter"),
    )
    .compose(loader)
    .unwrap()
}

async fn sessions(backend: Arc<MemoryStorage>) -> Arc<CookieSessions> {
    let storage = Arc::new(SecureStorage::new(backend, "test-secret").unwrap());
    Arc::new(
        CookieSessions::load(storage, "storage/session.bin", "test-secret", &SessionConfig::default())
            .await
            .unwrap(),
    )
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn cookie_of(resp: &axum::response::Response) -> Option<String> {
    resp.headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

#[tokio::test]
async fn test_session_persists_across_requests() {
    let backend = Arc::new(MemoryStorage::new());
    let sessions = sessions(backend.clone()).await;
    let app = compose(sessions.clone()).await.handler;

    let resp = app
        .clone()
        .oneshot(Request::get("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = cookie_of(&resp).expect("session cookie");
    assert!(cookie.starts_with("session="));
    let body = body_string(resp).await;
    assert!(body.contains("<title>Counter</title>"));
    assert!(body.contains("visits: 1"));
    assert_eq!(sessions.session_count(), 1);
    assert!(backend.raw("storage/session.bin").is_some());

    let resp = app
        .clone()
        .oneshot(
            Request::get("/count")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(body_string(resp).await.contains("visits: 2"));

    // A fresh process with the same key picks the session back up.
    let reloaded = self::sessions(backend).await;
    assert_eq!(reloaded.session_count(), 1);
    let app = compose(reloaded).await.handler;
    let resp = app
        .oneshot(
            Request::get("/count")
                .header("cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(body_string(resp).await.contains("visits: 3"));
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh() {
    let sessions = sessions(Arc::new(MemoryStorage::new())).await;
    let app = compose(sessions).await.handler;
    let resp = app
        .oneshot(
            Request::get("/count")
                .header("cookie", "session=someid.c2lnbmF0dXJl")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let cookie = cookie_of(&resp).unwrap();
    assert!(!cookie.contains("someid"));
    assert!(body_string(resp).await.contains("visits: 1"));
}

#[tokio::test]
async fn test_untouched_session_sets_no_cookie() {
    let sessions = sessions(Arc::new(MemoryStorage::new())).await;
    let app = compose(sessions.clone()).await.handler;
    let resp = app
        .oneshot(Request::get("/peek").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("set-cookie").is_none());
    assert_eq!(sessions.session_count(), 0);
}

#[tokio::test]
async fn test_core_roles_in_grant_table() {
    let composed = compose(sessions(Arc::new(MemoryStorage::new())).await).await;
    let names: Vec<_> = composed.grants.records().iter().map(|r| r.name.clone()).collect();
    assert_eq!(names, vec!["router", "html", "counter", "sessionmanager"]);
    assert!(composed.grants.is_approved("sessionmanager", GrantKind::RouterMiddlewareWrite));
    assert_eq!(composed.report.middleware, vec!["sessionmanager"]);
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let composed = compose(sessions(Arc::new(MemoryStorage::new())).await).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, composed.handler, async {
        let _ = rx.await;
    }));

    let resp = reqwest::get(format!("http://{addr}/peek")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "peek");

    let resp = reqwest::get(format!("http://{addr}/peer")).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "127.0.0.1");

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
