//! Boot sequence: environment, configuration, secrets, storage, composition,
//! listener. Every step either succeeds or aborts the boot.

use crate::app;
use ambit_config::{ConfigLoader, Environment, HostConfig, Secrets};
use ambit_core::Result;
use ambit_plugin::{CapabilityRegistry, Composed, PluginHost, TrustClassifier};
use ambit_server::CookieSessions;
use ambit_storage::{SecureStorage, SiteStore, StorageBackend, backend_for};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub const DOTENV_FILE: &str = ".env";

/// Snapshot the process environment, overlaying `.env` in local-development
/// mode. A missing `.env` in that mode is fatal.
pub fn environment() -> Result<Environment> {
    environment_from(Environment::capture(), Path::new(DOTENV_FILE))
}

pub fn environment_from(env: Environment, dotenv: &Path) -> Result<Environment> {
    if env.local_dev_mode() {
        info!(path = %dotenv.display(), "local development mode, loading .env");
        return env.with_dotenv(dotenv);
    }
    Ok(env)
}

pub fn load_config(path: Option<&Path>, env: &Environment) -> Result<ConfigLoader> {
    ConfigLoader::load(path, env)
}

/// Build storage and sessions over `backend`, then compose the application.
pub async fn compose(
    config: &HostConfig,
    env: &Environment,
    secrets: &Secrets,
    backend: Arc<dyn StorageBackend>,
) -> Result<Composed> {
    let storage = Arc::new(SecureStorage::new(backend, secrets.session_key())?);
    let site = Arc::new(SiteStore::load(storage.clone(), &config.storage.site_path).await?);
    let sessions = Arc::new(
        CookieSessions::load(
            storage,
            &config.storage.session_path,
            secrets.session_key(),
            &config.session,
        )
        .await?,
    );

    let loader = app::loader(config, sessions, secrets.password_hash());
    PluginHost::new(
        CapabilityRegistry::standard(),
        TrustClassifier::new(&config.trust),
    )
    .with_site_store(site)
    .with_environment(env.clone())
    .compose(loader)
}

/// Validate secrets, compose, and serve until shutdown.
pub async fn serve(config: HostConfig, env: Environment) -> Result<()> {
    let secrets = Secrets::from_env(&env)?;
    let backend = backend_for(&config.storage)?;
    let composed = compose(&config, &env, &secrets, backend).await?;
    info!(
        listen = %config.server.listen,
        routes = composed.report.routes.len(),
        "host ready"
    );
    ambit_server::start_server(&config.server.listen, composed.handler).await
}
