use ambit_core::{AmbitError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Session signing / storage encryption secret.
pub const SESSION_KEY_VAR: &str = "AMB_SESSION_KEY";
/// Password hash checked by the login plugin.
pub const PASSWORD_HASH_VAR: &str = "AMB_PASSWORD_HASH";
/// Set to a truthy value to load `.env` before validation.
pub const DOTENV_VAR: &str = "AMB_DOTENV";

/// Immutable snapshot of environment variables.
///
/// Captured once at boot and handed to whoever needs it. Values from the
/// process always shadow values loaded from a `.env` file.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether local-development mode is requested.
    pub fn local_dev_mode(&self) -> bool {
        matches!(
            self.get(DOTENV_VAR).map(|v| v.to_ascii_lowercase()),
            Some(ref v) if v == "1" || v == "true" || v == "yes"
        )
    }

    /// Overlay variables from a `.env` file beneath the current snapshot.
    pub fn with_dotenv(mut self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AmbitError::Config(format!("error loading {}: {}", path.display(), e))
        })?;
        let parsed = parse_dotenv(&raw).map_err(|(line, reason)| {
            AmbitError::Config(format!("{}:{}: {}", path.display(), line, reason))
        })?;
        let mut loaded = 0usize;
        for (key, value) in parsed {
            if !self.vars.contains_key(&key) {
                self.vars.insert(key, value);
                loaded += 1;
            }
        }
        info!(path = %path.display(), loaded, "loaded .env file");
        Ok(self)
    }
}

/// Parse `KEY=VALUE` lines. Supports comments, blank lines, an optional
/// `export ` prefix, and single or double quoted values.
fn parse_dotenv(raw: &str) -> std::result::Result<Vec<(String, String)>, (usize, String)> {
    let mut out = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| (idx + 1, "expected KEY=VALUE".to_string()))?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err((idx + 1, format!("invalid key '{key}'")));
        }
        let value = value.trim();
        let value = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            &value[1..value.len() - 1]
        } else {
            // Unquoted values may carry a trailing comment.
            value.split(" #").next().unwrap_or(value).trim_end()
        };
        debug!(key, "parsed .env entry");
        out.push((key.to_string(), value.to_string()));
    }
    Ok(out)
}

/// Secrets the host refuses to boot without.
#[derive(Clone)]
pub struct Secrets {
    session_key: String,
    password_hash: String,
}

impl Secrets {
    /// Read both secrets from the snapshot. A missing or empty one is fatal.
    pub fn from_env(env: &Environment) -> Result<Self> {
        let session_key = env
            .get(SESSION_KEY_VAR)
            .ok_or_else(|| AmbitError::MissingSecret(SESSION_KEY_VAR.into()))?;
        let password_hash = env
            .get(PASSWORD_HASH_VAR)
            .ok_or_else(|| AmbitError::MissingSecret(PASSWORD_HASH_VAR.into()))?;
        Ok(Self {
            session_key: session_key.to_string(),
            password_hash: password_hash.to_string(),
        })
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("session_key", &"<redacted>")
            .field("password_hash", &"<redacted>")
            .finish()
    }
}
