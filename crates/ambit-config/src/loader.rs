use ambit_core::{AmbitError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::env::Environment;
use crate::schema::HostConfig;

/// Loads the Ambit configuration once at boot.
///
/// There is no hot reload: the trust policy feeds the grant table, which is
/// immutable after composition.
pub struct ConfigLoader {
    config: HostConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > AMB_CONFIG env > ~/.ambit/ambit.toml
    pub fn resolve_path(explicit: Option<&Path>, env: &Environment) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Some(p) = env.get("AMB_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ambit")
            .join("ambit.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>, env: &Environment) -> Result<Self> {
        let config_path = Self::resolve_path(path, env);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                AmbitError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            HostConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config, env);

        // Log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(AmbitError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse a TOML document into a [`HostConfig`].
    pub fn parse(raw: &str) -> std::result::Result<HostConfig, toml::de::Error> {
        toml::from_str::<HostConfig>(raw)
    }

    /// The loaded configuration.
    pub fn get(&self) -> HostConfig {
        self.config.clone()
    }

    /// Path the configuration was resolved from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (AMB_LISTEN, PORT, AMB_URL_PREFIX, etc.)
    pub fn apply_env_overrides(mut config: HostConfig, env: &Environment) -> HostConfig {
        if let Some(v) = env.get("AMB_LISTEN") {
            config.server.listen = v.to_string();
        } else if let Some(port) = env.get("PORT").and_then(|p| p.parse::<u16>().ok()) {
            config.server.listen = format!("0.0.0.0:{port}");
        }
        if let Some(v) = env.get("AMB_URL_PREFIX") {
            config.server.url_prefix = Some(v.to_string());
        }
        if let Some(v) = env.get("AMB_CANONICAL_URL") {
            config.server.canonical_url = Some(v.to_string());
        }
        if let Some(v) = env.get("AMB_TRUST_PROXY") {
            config.server.trust_proxy_headers = matches!(v, "1" | "true" | "yes");
        }
        if let Some(v) = env.get("AMB_LOG_LEVEL") {
            config.logging.level = v.to_string();
        }
        if let Some(v) = env.get("AMB_STORAGE_URL") {
            config.storage.bucket_url = Some(v.to_string());
        }
        if let Some(v) = env.get("AMB_SITE_PATH") {
            config.storage.site_path = v.to_string();
        }
        if let Some(v) = env.get("AMB_SESSION_PATH") {
            config.storage.session_path = v.to_string();
        }
        config
    }
}
