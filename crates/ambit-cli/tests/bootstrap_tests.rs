use ambit_cli::bootstrap;
use ambit_config::env::{DOTENV_VAR, PASSWORD_HASH_VAR, SESSION_KEY_VAR};
use ambit_config::{Environment, HostConfig, Secrets};
use ambit_core::AmbitError;
use ambit_storage::LocalStorage;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn secrets() -> Secrets {
    Secrets::from_env(&Environment::from_pairs([
        (SESSION_KEY_VAR, "bootstrap-test-key"),
        (PASSWORD_HASH_VAR, "!"),
    ]))
    .unwrap()
}

#[test]
fn test_missing_session_key_is_fatal() {
    let env = Environment::from_pairs([(PASSWORD_HASH_VAR, "x")]);
    match Secrets::from_env(&env) {
        Err(AmbitError::MissingSecret(var)) => assert_eq!(var, SESSION_KEY_VAR),
        other => panic!("expected MissingSecret, got {other:?}"),
    }
}

#[tokio::test]
async fn test_serve_without_secrets_fails_before_listening() {
    let mut config = HostConfig::default();
    config.server.listen = "127.0.0.1:0".into();
    let err = bootstrap::serve(config, Environment::default()).await.unwrap_err();
    assert!(matches!(err, AmbitError::MissingSecret(_)));
}

#[test]
fn test_dotenv_only_in_dev_mode() {
    let dir = tempfile::tempdir().unwrap();
    let dotenv = dir.path().join(".env");
    std::fs::write(&dotenv, "AMB_SESSION_KEY=from-file\nAMB_URL_PREFIX=/ambit\n").unwrap();

    let env = bootstrap::environment_from(Environment::default(), &dotenv).unwrap();
    assert_eq!(env.get(SESSION_KEY_VAR), None);

    let dev = Environment::from_pairs([(DOTENV_VAR, "1"), (SESSION_KEY_VAR, "from-process")]);
    let env = bootstrap::environment_from(dev, &dotenv).unwrap();
    assert_eq!(env.get(SESSION_KEY_VAR), Some("from-process"));
    assert_eq!(env.get("AMB_URL_PREFIX"), Some("/ambit"));

    let dev = Environment::from_pairs([(DOTENV_VAR, "true")]);
    assert!(bootstrap::environment_from(dev, &dir.path().join("missing.env")).is_err());
}

#[tokio::test]
async fn test_application_composes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let composed = bootstrap::compose(
        &HostConfig::default(),
        &Environment::default(),
        &secrets(),
        Arc::new(LocalStorage::new(dir.path())),
    )
    .await
    .unwrap();

    let names: Vec<_> = composed.grants.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "router",
            "html",
            "pluginmanager",
            "login",
            "envinfo",
            "hello",
            "navigation",
            "logrequest",
            "urlrewrite",
            "ratelimit",
            "sessionmanager",
            "gzip",
            "etagcache",
            "redirecttourl",
            "cors",
            "healthcheck",
            "uptimerobotok",
            "notrailingslash",
        ]
    );

    let app = composed.handler;
    let resp = app
        .clone()
        .oneshot(Request::get("/api/healthcheck").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");

    let resp = app
        .oneshot(Request::get("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_in_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = HostConfig::default();
    let hash = ambit_plugins::login::hash_password_with("letmein", 1_000).unwrap();
    let secrets = Secrets::from_env(&Environment::from_pairs([
        (SESSION_KEY_VAR, "bootstrap-test-key"),
        (PASSWORD_HASH_VAR, hash.as_str()),
    ]))
    .unwrap();
    let env = Environment::default();
    let boot = || {
        bootstrap::compose(
            &config,
            &env,
            &secrets,
            Arc::new(LocalStorage::new(dir.path())),
        )
    };

    let first = boot().await.unwrap();
    assert_eq!(first.report.routes.len(), 5);
    let resp = first
        .handler
        .oneshot(
            Request::post("/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("password=letmein"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = resp.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(dir.path().join(&config.storage.session_path).exists());
    assert!(dir.path().join(&config.storage.site_path).exists());

    let second = boot().await.unwrap();
    let resp = second
        .handler
        .oneshot(
            Request::get("/dashboard/plugins")
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
