use ambit_config::schema::*;
use ambit_config::{ConfigLoader, Environment};
use ambit_core::GrantKind;
use std::io::Write;

// ── Default tests ──────────────────────────────────────────

#[test]
fn test_server_config_defaults() {
    let config = ServerConfig::default();
    assert_eq!(config.listen, "127.0.0.1:8080");
    assert!(config.url_prefix.is_none());
    assert_eq!(config.cors_prefix, "/api/");
    assert_eq!(config.healthcheck_path, "/api/healthcheck");
    assert!(config.canonical_url.is_none());
    assert!(!config.trust_proxy_headers);
}

#[test]
fn test_storage_config_defaults() {
    let config = StorageConfig::default();
    assert_eq!(config.site_path, "storage/site.bin");
    assert_eq!(config.session_path, "storage/session.bin");
    assert!(config.bucket_url.is_none());
}

#[test]
fn test_trust_config_defaults() {
    let config = TrustConfig::default();
    assert!(config.trusted.contains("pluginmanager"));
    assert!(config.trusted.contains("login"));
    assert!(!config.trusted.contains("hello"));
    assert!(config.grants["gzip"].contains(&GrantKind::RouterMiddlewareWrite));
    assert!(!config.grants.contains_key("hello"));
    assert!(config.grants["etagcache"].contains(&GrantKind::RouterMiddlewareWrite));
    assert!(config.grants["redirecttourl"].contains(&GrantKind::RouterMiddlewareWrite));
    assert!(config.grants["envinfo"].contains(&GrantKind::EnvironmentRead));
}

#[test]
fn test_default_config_validates_cleanly() {
    let warnings = HostConfig::default().validate().unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

// ── TOML tests ─────────────────────────────────────────────

#[test]
fn test_config_toml_roundtrip() {
    let config = HostConfig::default();
    let toml_str = toml::to_string_pretty(&config).unwrap();
    let restored = ConfigLoader::parse(&toml_str).unwrap();
    assert_eq!(restored.server.listen, config.server.listen);
    assert_eq!(restored.trust.trusted, config.trust.trusted);
    assert_eq!(restored.trust.grants, config.trust.grants);
}

#[test]
fn test_partial_toml_applies_defaults() {
    let toml_str = r#"
[server]
url_prefix = "/blog"

[trust.grants]
hello = ["router-route-write"]
"#;
    let config = ConfigLoader::parse(toml_str).unwrap();
    assert_eq!(config.server.url_prefix.as_deref(), Some("/blog"));
    assert_eq!(config.server.listen, "127.0.0.1:8080");
    assert_eq!(config.session.cookie_name, "session");
    assert!(config.trust.grants["hello"].contains(&GrantKind::RouterRouteWrite));
}

#[test]
fn test_unknown_grant_name_is_rejected() {
    let toml_str = r#"
[trust.grants]
hello = ["route-write"]
"#;
    assert!(ConfigLoader::parse(toml_str).is_err());
}

// ── Validation tests ───────────────────────────────────────

#[test]
fn test_validate_rejects_bad_prefix() {
    let mut config = HostConfig::default();
    config.server.url_prefix = Some("blog/".into());
    let err = config.validate().unwrap_err();
    assert!(err.contains("server.url_prefix"));
}

#[test]
fn test_validate_rejects_canonical_url_with_path() {
    let mut config = HostConfig::default();
    config.server.canonical_url = Some("https://example.com".into());
    assert!(config.validate().is_ok());
    config.server.canonical_url = Some("https://example.com/blog".into());
    assert!(config.validate().unwrap_err().contains("server.canonical_url"));
    config.server.canonical_url = Some("example.com".into());
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_shared_storage_path() {
    let mut config = HostConfig::default();
    config.storage.session_path = config.storage.site_path.clone();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_lifetime() {
    let mut config = HostConfig::default();
    config.session.lifetime_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_warns_on_trusted_with_allow_list() {
    let mut config = HostConfig::default();
    config
        .trust
        .grants
        .insert("login".into(), [GrantKind::SiteStorageRead].into());
    let warnings = config.validate().unwrap();
    assert!(warnings.iter().any(|w| w.field == "trust.grants.login"));
}

// ── ConfigLoader tests ─────────────────────────────────────

#[test]
fn test_loader_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.toml");
    let loader = ConfigLoader::load(Some(&path), &Environment::default()).unwrap();
    assert_eq!(loader.get().server.listen, "127.0.0.1:8080");
    assert_eq!(loader.path(), path.as_path());
}

#[test]
fn test_loader_reads_file_and_env_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ambit.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[server]\nlisten = \"127.0.0.1:9000\"\n[logging]\nlevel = \"debug\"").unwrap();

    let env = Environment::from_pairs([("AMB_LOG_LEVEL", "warn")]);
    let config = ConfigLoader::load(Some(&path), &env).unwrap().get();
    assert_eq!(config.server.listen, "127.0.0.1:9000");
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_loader_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ambit.toml");
    std::fs::write(&path, "[server\nlisten = ").unwrap();
    let err = ConfigLoader::load(Some(&path), &Environment::default()).err().unwrap();
    assert!(err.is_fatal());
}

#[test]
fn test_env_overrides() {
    let env = Environment::from_pairs([
        ("PORT", "9090"),
        ("AMB_URL_PREFIX", "/proxy"),
        ("AMB_STORAGE_URL", "https://storage.example.com/bucket"),
        ("AMB_SITE_PATH", "data/site.bin"),
    ]);
    let config = ConfigLoader::apply_env_overrides(HostConfig::default(), &env);
    assert_eq!(config.server.listen, "0.0.0.0:9090");
    assert_eq!(config.server.url_prefix.as_deref(), Some("/proxy"));
    assert_eq!(
        config.storage.bucket_url.as_deref(),
        Some("https://storage.example.com/bucket")
    );
    assert_eq!(config.storage.site_path, "data/site.bin");
}

#[test]
fn test_amb_listen_beats_port() {
    let env = Environment::from_pairs([("PORT", "9090"), ("AMB_LISTEN", "127.0.0.1:7000")]);
    let config = ConfigLoader::apply_env_overrides(HostConfig::default(), &env);
    assert_eq!(config.server.listen, "127.0.0.1:7000");
}

#[test]
fn test_proxy_and_canonical_env_overrides() {
    let env = Environment::from_pairs([
        ("AMB_CANONICAL_URL", "https://example.com"),
        ("AMB_TRUST_PROXY", "true"),
    ]);
    let config = ConfigLoader::apply_env_overrides(HostConfig::default(), &env);
    assert_eq!(config.server.canonical_url.as_deref(), Some("https://example.com"));
    assert!(config.server.trust_proxy_headers);

    let env = Environment::from_pairs([("AMB_TRUST_PROXY", "no")]);
    let config = ConfigLoader::apply_env_overrides(HostConfig::default(), &env);
    assert!(!config.server.trust_proxy_headers);
}
